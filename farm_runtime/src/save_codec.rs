//! Save Codec — game document encoder/decoder.
//!
//! Pure codec layer plus thin file helpers. A save is the serde form of
//! `GameState`, either as plain JSON or wrapped for transport as base64
//! text. Decoding detects the form from the first non-blank character.
//!
//! - `encode_save`:   GameState → document text in the chosen transport
//! - `decode_save`:   text → GameState (transport detection, field checks)
//! - `restore_save`:  decode + invariant validation
//! - `export_save_to_file` / `import_save_from_file`: file I/O
//! - `save_hash`:     canonical hash of a decoded save

use std::fs;
use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use farm_engine::catalog::Catalog;
use farm_engine::domain::GameState;
use farm_engine::hashing::canonical_hash;
use farm_engine::invariants::try_validate_invariants;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// All possible save codec failures.
#[derive(Debug, Error)]
pub enum SaveError {
    /// A load-bearing field is absent or has the wrong shape.
    #[error("save is missing {0}")]
    MissingField(&'static str),
    /// The text is neither JSON nor valid base64.
    #[error("transport decoding failed: {0}")]
    Transport(#[from] base64::DecodeError),
    /// Decoded transport bytes are not UTF-8.
    #[error("decoded save is not UTF-8")]
    NotUtf8,
    #[error("malformed save: {0}")]
    Parse(#[from] serde_json::Error),
    /// Loaded state violates kernel invariants.
    #[error("save violates invariants: {0}")]
    Invariant(String),
    #[error("save io: {0}")]
    Io(#[from] io::Error),
}

/// How a save travels as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Json,
    Base64,
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

pub fn encode_save(state: &GameState, transport: Transport) -> Result<String, SaveError> {
    let json = serde_json::to_string(state)?;
    Ok(match transport {
        Transport::Json => json,
        Transport::Base64 => STANDARD.encode(json.as_bytes()),
    })
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A document starts with `{`; anything else is a transport blob.
pub fn detect_transport(text: &str) -> Transport {
    if text.trim_start().starts_with('{') {
        Transport::Json
    } else {
        Transport::Base64
    }
}

/// Decode a save, rejecting documents without a numeric `money` or an
/// array of `facilities` before any typed parsing. Every other field is
/// optional and takes its default.
pub fn decode_save(text: &str) -> Result<GameState, SaveError> {
    let transport = detect_transport(text);
    let json = match transport {
        Transport::Json => text.to_string(),
        Transport::Base64 => {
            let bytes = STANDARD.decode(text.trim())?;
            String::from_utf8(bytes).map_err(|_| SaveError::NotUtf8)?
        }
    };
    debug!(?transport, bytes = json.len(), "decoding save");

    let doc: Value = serde_json::from_str(&json)?;
    if !doc.get("money").map_or(false, Value::is_number) {
        return Err(SaveError::MissingField("money"));
    }
    if !doc.get("facilities").map_or(false, Value::is_array) {
        return Err(SaveError::MissingField("facilities"));
    }
    Ok(serde_json::from_value(doc)?)
}

/// Decode and validate against the kernel's invariant suite.
pub fn restore_save(text: &str, catalog: &Catalog) -> Result<GameState, SaveError> {
    let state = decode_save(text)?;
    try_validate_invariants(&state, catalog).map_err(SaveError::Invariant)?;
    Ok(state)
}

pub fn save_hash(text: &str) -> Result<String, SaveError> {
    decode_save(text).map(|state| canonical_hash(&state))
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

pub fn export_save_to_file(
    state: &GameState,
    transport: Transport,
    path: &Path,
) -> Result<(), SaveError> {
    let text = encode_save(state, transport)?;
    fs::write(path, text)?;
    Ok(())
}

pub fn import_save_from_file(path: &Path, catalog: &Catalog) -> Result<GameState, SaveError> {
    let text = fs::read_to_string(path)?;
    restore_save(&text, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_engine::state::create_initial_state;

    #[test]
    fn test_both_transports_decode_to_the_same_state() {
        let state = create_initial_state(&Catalog::standard());
        let plain = encode_save(&state, Transport::Json).unwrap();
        let blob = encode_save(&state, Transport::Base64).unwrap();
        assert_eq!(detect_transport(&plain), Transport::Json);
        assert_eq!(detect_transport(&blob), Transport::Base64);
        assert_eq!(decode_save(&plain).unwrap(), state);
        assert_eq!(decode_save(&blob).unwrap(), state);
    }

    #[test]
    fn test_leading_whitespace_is_still_json() {
        assert_eq!(detect_transport("  \n{\"money\":1}"), Transport::Json);
    }

    #[test]
    fn test_load_bearing_fields_are_required() {
        assert!(matches!(
            decode_save(r#"{"facilities": []}"#),
            Err(SaveError::MissingField("money"))
        ));
        assert!(matches!(
            decode_save(r#"{"money": "lots", "facilities": []}"#),
            Err(SaveError::MissingField("money"))
        ));
        assert!(matches!(
            decode_save(r#"{"money": 5, "facilities": {}}"#),
            Err(SaveError::MissingField("facilities"))
        ));
    }

    #[test]
    fn test_minimal_document_takes_defaults() {
        let state = decode_save(r#"{"money": 5, "facilities": []}"#).unwrap();
        assert_eq!(state.money, 5);
        assert!(state.tutorial_completed);
        assert!(state.nations.is_empty());
    }

    #[test]
    fn test_bad_base64_is_a_transport_error() {
        assert!(matches!(decode_save("%%%"), Err(SaveError::Transport(_))));
    }

    #[test]
    fn test_restore_rejects_invariant_breach() {
        let catalog = Catalog::standard();
        let err = restore_save(r#"{"money": -1, "facilities": []}"#, &catalog).unwrap_err();
        assert!(matches!(err, SaveError::Invariant(_)));
    }
}
