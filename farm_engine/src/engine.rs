/// Farm engine — Engine
///
/// Top-level orchestrator. Delegates mutation to transitions,
/// validates via invariants.
///
/// Strict sequence enforcement; per-action seeds drawn from a master stream.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::actions::{Action, ActionEnvelope};
use crate::arithmetic::Millis;
use crate::catalog::Catalog;
use crate::domain::GameState;
use crate::outcome::TransitionResult;
use crate::state::create_initial_state;
use crate::transitions::apply_action;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },
}

/// Stateful engine wrapping the pure functional transition layer.
pub struct FarmEngine {
    catalog: Catalog,
    state: GameState,
    last_sequence: u64,
    master_seed: u64,
    seeds: ChaCha8Rng,
}

impl FarmEngine {
    /// Fresh game on the given catalog.
    pub fn new(catalog: Catalog, master_seed: u64) -> Self {
        let state = create_initial_state(&catalog);
        Self::with_state(catalog, state, master_seed)
    }

    /// Resume from an existing state; the sequence restarts at zero.
    pub fn with_state(catalog: Catalog, state: GameState, master_seed: u64) -> Self {
        Self {
            catalog,
            state,
            last_sequence: 0,
            master_seed,
            seeds: ChaCha8Rng::seed_from_u64(master_seed),
        }
    }

    /// Resume from a state reached after `last_sequence` envelopes. The
    /// master stream skips the seeds those envelopes already consumed.
    pub fn resume(catalog: Catalog, state: GameState, last_sequence: u64, master_seed: u64) -> Self {
        let mut engine = Self::with_state(catalog, state, master_seed);
        for _ in 0..last_sequence {
            engine.seeds.next_u64();
        }
        engine.last_sequence = last_sequence;
        engine
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Wrap a live action in the next envelope and apply it.
    ///
    /// The returned envelope is what a log must record to reproduce
    /// this step.
    pub fn dispatch(&mut self, action: Action, now: Millis) -> (ActionEnvelope, TransitionResult) {
        let envelope = ActionEnvelope {
            sequence: self.last_sequence + 1,
            now,
            seed: self.seeds.next_u64(),
            action,
        };
        let result = self.commit(&envelope);
        (envelope, result)
    }

    /// Apply a recorded envelope:
    ///   1. Validate sequence (strictly increasing, no gaps)
    ///   2. Delegate to transitions::apply_action
    ///   3. Store the resulting state
    pub fn apply_envelope(
        &mut self,
        envelope: &ActionEnvelope,
    ) -> Result<TransitionResult, EngineError> {
        let expected = self.last_sequence + 1;
        if envelope.sequence != expected {
            return Err(EngineError::SequenceViolation {
                expected,
                got: envelope.sequence,
            });
        }
        // Keep the master stream aligned with a live run of the same log.
        self.seeds.next_u64();
        Ok(self.commit(envelope))
    }

    /// Apply an ordered sequence of envelopes.
    pub fn apply_sequence(
        &mut self,
        envelopes: &[ActionEnvelope],
    ) -> Result<&GameState, EngineError> {
        for envelope in envelopes {
            self.apply_envelope(envelope)?;
        }
        Ok(&self.state)
    }

    /// Event-sourced reconstruction: reset to a fresh game and replay.
    pub fn replay(&mut self, envelopes: &[ActionEnvelope]) -> Result<&GameState, EngineError> {
        self.state = create_initial_state(&self.catalog);
        self.last_sequence = 0;
        self.seeds = ChaCha8Rng::seed_from_u64(self.master_seed);
        self.apply_sequence(envelopes)
    }

    fn commit(&mut self, envelope: &ActionEnvelope) -> TransitionResult {
        let (next, result) = apply_action(&self.state, &self.catalog, envelope);
        self.state = next;
        self.last_sequence = envelope.sequence;
        result
    }
}
