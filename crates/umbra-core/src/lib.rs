//! # umbra-core
//! Foundation types and traits for the Umbra proof-of-work protocol.

pub mod compact;
pub mod constants;
pub mod error;
pub mod params;
pub mod traits;
pub mod types;
