//! Legacy hash-below-target proof-of-work check.
//!
//! Every verifier in this crate shares one shape: decode the claimed
//! compact target, reject if it fails any validity rule, then compare an
//! algorithm-specific 256-bit hash against it. This module is the plain
//! variant where the block hash itself is the proof.

use umbra_core::compact;
use umbra_core::params::ConsensusParams;
use umbra_core::types::Hash256;

/// Check whether `hash` satisfies the proof-of-work requirement claimed by
/// `bits`.
///
/// Rejects when `bits` is negative, overflowed, zero, or easier than the
/// network's `pow_limit`; otherwise accepts iff the hash, read as a
/// big-endian 256-bit magnitude, is strictly below the decoded target.
pub fn check_proof_of_work(hash: &Hash256, bits: u32, params: &ConsensusParams) -> bool {
    let Some(target) = compact::decode_checked(bits, &params.pow_limit) else {
        return false;
    };

    hash.to_u256() < target
}
