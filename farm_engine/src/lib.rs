#![forbid(unsafe_code)]

/// Engine v1. Bumping this changes every canonical hash.
pub const ENGINE_VERSION: u32 = 1;

pub mod arithmetic;
pub mod outcome;
pub mod domain;
pub mod catalog;
pub mod state;
pub mod actions;
pub mod bonus;
pub mod timer;
pub mod farming;
pub mod ruins;
pub mod economy;
pub mod mining;
pub mod conquest;
pub mod progression;
pub mod tournament;
pub mod transitions;
pub mod invariants;
pub mod readiness;
pub mod hashing;
pub mod engine;
