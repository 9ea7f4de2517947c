//! Trait interfaces between the PoW subsystem and its collaborators.
//!
//! These seams keep the consensus crate free of storage concerns:
//! - [`BlockIndex`] — a cursor over the backward-linked header chain,
//!   implemented by the node's block index (retargeter input)
//! - [`ActiveChain`] — height-indexed lookups on the active chain
//!   (RandomX key-block selection input)
//! - [`PowHeader`] — the candidate block header fields the verifiers read

use crate::types::Hash256;

/// A position in the backward-linked chain of block headers.
///
/// Implementations are lightweight views (a reference plus an offset into
/// the node's index); `prev` hands back the view one link earlier, or
/// `None` before genesis. The retargeter never mutates the chain.
pub trait BlockIndex: Clone {
    /// Height of this block.
    fn height(&self) -> u64;

    /// Block timestamp (Unix seconds).
    fn time(&self) -> i64;

    /// The compact difficulty target this block was mined against.
    fn bits(&self) -> u32;

    /// Whether this block is proof-of-stake.
    fn is_proof_of_stake(&self) -> bool;

    /// Whether this block is ProgPow proof-of-work.
    fn is_prog_proof_of_work(&self) -> bool;

    /// The block's own hash.
    fn block_hash(&self) -> Hash256;

    /// The previous block, or `None` at genesis.
    fn prev(&self) -> Option<Self>;
}

/// Height-indexed view of the active chain.
///
/// Used by RandomX key-block selection, which addresses blocks by absolute
/// height rather than by walking links.
pub trait ActiveChain: Send + Sync {
    /// Height of the current tip.
    fn tip_height(&self) -> u64;

    /// Hash of the block at `height` on the active chain, or `None` if the
    /// chain has not reached that height.
    fn block_hash_at(&self, height: u64) -> Option<Hash256>;

    /// Hash of the genesis block.
    fn genesis_hash(&self) -> Hash256;
}

/// The header fields a PoW verifier reads from a candidate block.
///
/// Header (de)serialization lives with the block primitives; the verifiers
/// only consume the already-computed algorithm-specific hashes.
pub trait PowHeader {
    /// Height the candidate block claims.
    fn height(&self) -> u64;

    /// The 64-bit nonce used by the ProgPow family.
    fn nonce64(&self) -> u64;

    /// Hash of the header fields covered by the ProgPow seal.
    fn prog_pow_header_hash(&self) -> Hash256;

    /// Hash blob the RandomX VM is fed for this header.
    fn randomx_header_hash(&self) -> Hash256;
}
