//! Snapshot layer — deterministic state snapshots.
//!
//! Snapshots contain canonical JSON + hash for verification.
//! No timestamps in snapshot content (determinism).
//!
//! If a snapshot fails verification, the session falls back to a full replay.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use farm_engine::domain::GameState;
use farm_engine::hashing::{canonical_hash, canonical_string};
use farm_engine::ENGINE_VERSION;

/// Snapshot on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Sequence number of the last envelope folded into this state.
    pub sequence: u64,
    /// Canonical JSON of the state (UTF-8).
    pub canonical_json: String,
    /// SHA-256 of the canonical JSON.
    pub hash: String,
    /// Engine version at snapshot time.
    pub engine_version: u32,
}

impl Snapshot {
    pub fn capture(sequence: u64, state: &GameState) -> Self {
        Self {
            sequence,
            canonical_json: canonical_string(state),
            hash: canonical_hash(state),
            engine_version: ENGINE_VERSION,
        }
    }

    /// Recover the state held in the canonical JSON.
    pub fn state(&self) -> Result<GameState, serde_json::Error> {
        let mut root: Value = serde_json::from_str(&self.canonical_json)?;
        let state = root.get_mut("state").map(Value::take).unwrap_or(Value::Null);
        serde_json::from_value(state)
    }
}

fn snapshot_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(format!("snapshot_{:06}.json", sequence))
}

/// Save a deterministic snapshot of the current state.
pub fn save_snapshot(dir: &Path, sequence: u64, state: &GameState) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let snap = Snapshot::capture(sequence, state);
    let content = serde_json::to_string(&snap)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let path = snapshot_path(dir, sequence);
    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    Ok(path)
}

/// Load a snapshot at a specific sequence number.
/// Returns None if no snapshot exists at that sequence.
pub fn load_snapshot(dir: &Path, sequence: u64) -> io::Result<Option<Snapshot>> {
    let path = snapshot_path(dir, sequence);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let snap: Snapshot = serde_json::from_str(&content).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("bad snapshot: {}", e))
    })?;

    Ok(Some(snap))
}

/// Sequence numbers of every snapshot in a directory, newest first.
pub fn list_snapshots(dir: &Path) -> io::Result<Vec<u64>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut sequences = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if let Some(seq) = name
            .strip_prefix("snapshot_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u64>().ok())
        {
            sequences.push(seq);
        }
    }
    sequences.sort_unstable_by(|a, b| b.cmp(a));
    Ok(sequences)
}

/// Load the latest snapshot in a directory.
pub fn load_latest_snapshot(dir: &Path) -> io::Result<Option<Snapshot>> {
    match list_snapshots(dir)?.first() {
        Some(&seq) => load_snapshot(dir, seq),
        None => Ok(None),
    }
}

/// Verify a snapshot's internal hash consistency and engine version.
pub fn verify_snapshot_hash(snap: &Snapshot) -> bool {
    let digest = Sha256::digest(snap.canonical_json.as_bytes());
    let computed: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    snap.engine_version == ENGINE_VERSION && computed == snap.hash
}
