#![forbid(unsafe_code)]

//! Farm Engine — Rust Runtime
//!
//! Wraps the deterministic kernel with persistence, replay,
//! snapshot, save-document, session management, and drift detection.
//!
//! No domain logic lives here. All transitions and invariants
//! are delegated to the kernel.

pub mod proto_types;
pub mod proto_bridge;
pub mod action_store;
pub mod replay;
pub mod snapshot;
pub mod save_codec;
pub mod session;
pub mod drift;
