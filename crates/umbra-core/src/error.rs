//! Error types for the Umbra protocol.
//!
//! PoW rejections are deliberately NOT errors: every verifier is a boolean
//! predicate, because a failed check is a routine consensus outcome. The
//! types here cover resource lifecycle failures only.

use thiserror::Error;

/// Failures of the RandomX key-cache lifecycle.
///
/// Allocation failures from the RandomX library are effectively fatal for a
/// node (it can no longer verify blocks); they are surfaced here so the
/// caller decides how loudly to die.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RandomXError {
    #[error("key cache not initialized")]
    NotInitialized,
    #[error("randomx cache allocation failed: {0}")]
    CacheAlloc(String),
    #[error("randomx vm creation failed: {0}")]
    VmCreate(String),
    #[error("randomx hash failed: {0}")]
    HashFailed(String),
    #[error("randomx hash returned {got} bytes, expected 32")]
    BadHashLength { got: usize },
}
