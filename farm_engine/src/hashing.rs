/// Farm engine — Canonical Hashing
///
/// Deterministic canonical serialization + SHA-256 hashing.
///
/// Rules:
///   - engine version first, then the state
///   - struct fields in declaration order, keyed maps in key order
///   - list order is meaningful and kept (facilities, roster, bracket)
///   - UTF-8 JSON, no whitespace; the state carries no floats

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::GameState;
use crate::ENGINE_VERSION;

/// Canonical serialization of GameState to UTF-8 JSON bytes.
pub fn canonical_serialize(state: &GameState) -> Vec<u8> {
    canonical_string(state).into_bytes()
}

/// SHA-256 of the canonical serialization, lowercase hex.
pub fn canonical_hash(state: &GameState) -> String {
    hash_bytes(&canonical_serialize(state))
}

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn canonical_string(state: &GameState) -> String {
    build_canonical_value(state).to_string()
}

fn build_canonical_value(state: &GameState) -> Value {
    let mut root = Map::new();
    root.insert(
        "engineVersion".to_string(),
        Value::Number(u64::from(ENGINE_VERSION).into()),
    );
    // GameState holds only strings, integers, bools and ordered maps, so
    // its serde form cannot fail.
    root.insert(
        "state".to_string(),
        serde_json::to_value(state).unwrap_or(Value::Null),
    );
    Value::Object(root)
}
