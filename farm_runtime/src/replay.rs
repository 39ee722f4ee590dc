//! Replay orchestrator — rebuild state from the action log.
//!
//! Delegates all domain logic to the kernel.
//! No shortcuts, no cached state logic.

use farm_engine::actions::ActionEnvelope;
use farm_engine::catalog::Catalog;
use farm_engine::domain::GameState;
use farm_engine::engine::{EngineError, FarmEngine};
use farm_engine::hashing::canonical_hash;

use crate::proto_bridge::proto_to_envelope;
use crate::proto_types::ProtoActionRecord;

/// Rebuild the game state from a sequence of envelopes.
///
/// 1. Create fresh engine + initial state
/// 2. Pass each envelope sequentially to the kernel
/// 3. Return (final_state, canonical_hash)
///
/// Envelopes carry their own seeds, so the engine's master seed plays
/// no part and the result is a pure function of the log.
pub fn rebuild_state(
    catalog: &Catalog,
    envelopes: &[ActionEnvelope],
) -> Result<(GameState, String), EngineError> {
    let mut engine = FarmEngine::new(catalog.clone(), 0);
    let state = engine.apply_sequence(envelopes)?.clone();
    let hash = canonical_hash(&state);
    Ok((state, hash))
}

/// Rebuild state and return only the canonical hash.
pub fn rebuild_hash(catalog: &Catalog, envelopes: &[ActionEnvelope]) -> Result<String, EngineError> {
    rebuild_state(catalog, envelopes).map(|(_, hash)| hash)
}

/// Decode a run of log records into kernel envelopes.
pub fn decode_records(records: &[ProtoActionRecord]) -> Result<Vec<ActionEnvelope>, serde_json::Error> {
    records.iter().map(proto_to_envelope).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_engine::actions::Action;

    #[test]
    fn test_empty_log_is_the_initial_state() {
        let catalog = Catalog::standard();
        let (state, hash) = rebuild_state(&catalog, &[]).unwrap();
        assert_eq!(state, farm_engine::state::create_initial_state(&catalog));
        assert_eq!(hash, canonical_hash(&state));
    }

    #[test]
    fn test_log_must_start_at_one() {
        let envelope = ActionEnvelope {
            sequence: 5,
            now: 0,
            seed: 0,
            action: Action::HarvestAll,
        };
        let err = rebuild_hash(&Catalog::standard(), &[envelope]).unwrap_err();
        assert_eq!(err, EngineError::SequenceViolation { expected: 1, got: 5 });
    }
}
