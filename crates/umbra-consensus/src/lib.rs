//! # umbra-consensus — Difficulty retargeting and proof-of-work verification.
//!
//! The security-critical core of the node: decides the required difficulty
//! for the next block ([`difficulty`]) and verifies that a candidate block
//! satisfies it under one of the supported hashing algorithms ([`pow`],
//! [`progpow`], [`randomx`]).
//!
//! All verifiers are boolean predicates — a rejection is a routine
//! consensus outcome, never an error. Which algorithm must verify a given
//! block is external chain configuration; callers pass explicit selectors.

pub mod difficulty;
pub mod pow;
pub mod progpow;
pub mod randomx;

pub use difficulty::{dark_gravity_wave, next_work_required};
pub use pow::check_proof_of_work;
pub use progpow::{ProgPowEngine, ProgPowMix, ProgPowVerifier};
pub use randomx::{key_block_height, select_key_block};
#[cfg(feature = "randomx")]
pub use randomx::{check_randomx_proof_of_work, RandomXKeyCache};
