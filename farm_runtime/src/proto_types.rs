//! Hand-written protobuf types for the action log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the on-disk format; never renumber.

use prost::Message;

// ── Action Record ──────────────────────────────────────────────

/// One logged action envelope.
///
/// The action itself travels as its JSON form split in two: the
/// `type` tag and the serialized `payload` object (empty when the
/// action carries none).
#[derive(Clone, PartialEq, Message)]
pub struct ProtoActionRecord {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    /// Caller clock in milliseconds.
    #[prost(int64, tag = "2")]
    pub now: i64,
    #[prost(uint64, tag = "3")]
    pub seed: u64,
    #[prost(string, tag = "4")]
    pub action_type: String,
    #[prost(string, tag = "5")]
    pub payload_json: String,
}
