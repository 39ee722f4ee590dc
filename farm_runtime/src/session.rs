//! Session manager — isolated sessions with persist-after-apply semantics.
//!
//! Each session gets its own directory with an action log and snapshots.
//! Concurrency: Mutex for write serialization, no global mutable state.
//!
//! Apply-before-persist order:
//!   1. engine applies the envelope (sequence checked; a game-level
//!      rejection is still a logged step so replays stay aligned)
//!   2. action_store.append(), only if step 1 passed sequence validation
//!   3. snapshot if interval reached
//!
//! Opening a session resumes from the newest snapshot that verifies and
//! replays the log tail after it; without one, the whole log is replayed.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use farm_engine::actions::{Action, ActionEnvelope};
use farm_engine::arithmetic::Millis;
use farm_engine::catalog::Catalog;
use farm_engine::domain::GameState;
use farm_engine::engine::{EngineError, FarmEngine};
use farm_engine::hashing::canonical_hash;
use farm_engine::outcome::TransitionResult;

use crate::action_store::ActionStore;
use crate::proto_bridge::envelope_to_proto;
use crate::replay;
use crate::save_codec::{self, SaveError, Transport};
use crate::snapshot::{self, Snapshot};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("session io: {0}")]
    Io(#[from] io::Error),
    #[error("undecodable log payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error("session lock poisoned")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for SessionError {
    fn from(_: PoisonError<T>) -> Self {
        SessionError::Poisoned
    }
}

/// Per-session knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Snapshot every N sequences; 0 disables snapshots.
    pub snapshot_interval: u64,
    /// Seeds the master stream that hands each live action its seed.
    pub master_seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 100,
            master_seed: 0,
        }
    }
}

/// An isolated game session with its own action log and state.
pub struct Session {
    session_id: String,
    session_dir: PathBuf,
    engine: FarmEngine,
    action_store: ActionStore,
    config: SessionConfig,
}

impl Session {
    /// Open (or create) a session in the given base directory.
    ///
    /// Directory structure:
    ///   <base_dir>/<session_id>/actions.log
    ///   <base_dir>/<session_id>/snapshots/
    pub fn open(
        base_dir: &Path,
        session_id: &str,
        catalog: Catalog,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let session_dir = base_dir.join(session_id);
        let action_store = ActionStore::open(&session_dir.join("actions.log"))?;
        let snap_dir = session_dir.join("snapshots");

        let engine = match usable_snapshot(&snap_dir, action_store.last_sequence())? {
            Some((snap, state)) => {
                let tail = replay::decode_records(&action_store.load_after(snap.sequence)?)?;
                let mut engine =
                    FarmEngine::resume(catalog, state, snap.sequence, config.master_seed);
                engine.apply_sequence(&tail)?;
                info!(
                    session = session_id,
                    snapshot = snap.sequence,
                    tail = tail.len(),
                    "resumed from snapshot"
                );
                engine
            }
            None => {
                let envelopes = replay::decode_records(&action_store.load_all()?)?;
                let mut engine = FarmEngine::new(catalog, config.master_seed);
                engine.apply_sequence(&envelopes)?;
                if !envelopes.is_empty() {
                    info!(session = session_id, actions = envelopes.len(), "replayed full log");
                }
                engine
            }
        };

        Ok(Self {
            session_id: session_id.to_string(),
            session_dir,
            engine,
            action_store,
            config,
        })
    }

    /// Dispatch a live action: the engine assigns sequence and seed,
    /// then the envelope is persisted.
    pub fn apply(&mut self, action: Action, now: Millis) -> Result<TransitionResult, SessionError> {
        let (envelope, result) = self.engine.dispatch(action, now);
        self.persist(&envelope)?;
        Ok(result)
    }

    /// Apply a recorded envelope, then persist it.
    ///
    /// A sequence violation is returned before anything is written.
    pub fn apply_envelope(
        &mut self,
        envelope: &ActionEnvelope,
    ) -> Result<TransitionResult, SessionError> {
        let result = self.engine.apply_envelope(envelope)?;
        self.persist(envelope)?;
        Ok(result)
    }

    /// Decode a save document and hand it to the engine as LOAD_GAME.
    /// A document the codec refuses never reaches the log.
    pub fn load_save(&mut self, text: &str, now: Millis) -> Result<TransitionResult, SessionError> {
        let state = save_codec::decode_save(text)?;
        self.apply(
            Action::LoadGame {
                new_state: Box::new(state),
            },
            now,
        )
    }

    pub fn export_save(&self, transport: Transport) -> Result<String, SessionError> {
        Ok(save_codec::encode_save(self.engine.state(), transport)?)
    }

    fn persist(&mut self, envelope: &ActionEnvelope) -> Result<(), SessionError> {
        self.action_store.append(&envelope_to_proto(envelope))?;

        let interval = self.config.snapshot_interval;
        if interval > 0 && envelope.sequence % interval == 0 {
            snapshot::save_snapshot(&self.snapshot_dir(), envelope.sequence, self.engine.state())?;
        }
        Ok(())
    }

    /// Full replay from the action log, rebuilding the engine from scratch.
    pub fn replay_full(&mut self) -> Result<(GameState, String), SessionError> {
        let envelopes = replay::decode_records(&self.action_store.load_all()?)?;
        let mut engine = FarmEngine::new(self.engine.catalog().clone(), self.config.master_seed);
        engine.apply_sequence(&envelopes)?;
        let state = engine.state().clone();
        let hash = canonical_hash(&state);
        self.engine = engine;
        Ok((state, hash))
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn catalog(&self) -> &Catalog {
        self.engine.catalog()
    }

    pub fn current_hash(&self) -> String {
        canonical_hash(self.engine.state())
    }

    pub fn current_sequence(&self) -> u64 {
        self.engine.last_sequence()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.session_dir.join("snapshots")
    }
}

/// Newest snapshot that verifies, decodes, and does not run ahead of the log.
fn usable_snapshot(
    dir: &Path,
    log_sequence: u64,
) -> Result<Option<(Snapshot, GameState)>, SessionError> {
    for seq in snapshot::list_snapshots(dir)? {
        if seq > log_sequence {
            warn!(snapshot = seq, log = log_sequence, "snapshot ahead of log, skipping");
            continue;
        }
        let snap = match snapshot::load_snapshot(dir, seq) {
            Ok(Some(snap)) => snap,
            Ok(None) => continue,
            Err(e) => {
                warn!(snapshot = seq, error = %e, "unreadable snapshot, skipping");
                continue;
            }
        };
        if !snapshot::verify_snapshot_hash(&snap) {
            warn!(snapshot = seq, "snapshot hash mismatch, skipping");
            continue;
        }
        match snap.state() {
            Ok(state) => return Ok(Some((snap, state))),
            Err(e) => warn!(snapshot = seq, error = %e, "snapshot state undecodable, skipping"),
        }
    }
    if log_sequence > 0 {
        warn!(log = log_sequence, "no usable snapshot, falling back to full replay");
    }
    Ok(None)
}

/// Thread-safe session handle using Mutex.
pub struct SharedSession {
    inner: Mutex<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, SessionError> {
        Ok(self.inner.lock()?)
    }

    /// Apply a live action under lock.
    pub fn apply(&self, action: Action, now: Millis) -> Result<TransitionResult, SessionError> {
        self.lock()?.apply(action, now)
    }

    pub fn apply_envelope(
        &self,
        envelope: &ActionEnvelope,
    ) -> Result<TransitionResult, SessionError> {
        self.lock()?.apply_envelope(envelope)
    }

    /// Clone of the current state under lock.
    pub fn snapshot_state(&self) -> Result<GameState, SessionError> {
        Ok(self.lock()?.state().clone())
    }

    pub fn current_hash(&self) -> Result<String, SessionError> {
        Ok(self.lock()?.current_hash())
    }

    pub fn current_sequence(&self) -> Result<u64, SessionError> {
        Ok(self.lock()?.current_sequence())
    }
}
