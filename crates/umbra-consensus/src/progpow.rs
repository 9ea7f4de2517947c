//! ProgPow proof-of-work verification.
//!
//! The hash function itself lives in an external library with a fixed
//! contract: epoch numbering, epoch-context construction, a mix+final hash
//! over (header hash, height, nonce), and boundary verification. That
//! contract is the [`ProgPowEngine`] trait here; the verifier is generic
//! over it and owns the epoch-context memoization, since building a context
//! is expensive and contexts are valid for a whole epoch of heights.

use parking_lot::Mutex;

use umbra_core::compact;
use umbra_core::params::ConsensusParams;
use umbra_core::traits::PowHeader;
use umbra_core::types::Hash256;

/// Output of one ProgPow hash computation.
pub struct ProgPowMix {
    /// The intermediate mix hash committed to by the seal.
    pub mix_hash: Hash256,
    /// The final hash compared against the boundary.
    pub final_hash: Hash256,
}

/// The external ProgPow/ethash library contract.
///
/// Implementations wrap the actual dataset-backed hasher; tests substitute
/// a cheap stand-in. The engine is treated as an opaque primitive — this
/// crate never looks inside a context.
pub trait ProgPowEngine: Send + Sync {
    /// Precomputed dataset, valid for every height in one epoch.
    type Context: Send;

    /// Epoch number containing `height`.
    fn epoch_number(&self, height: u64) -> u64;

    /// Build the dataset context for an epoch. Expensive.
    fn build_context(&self, epoch: u64) -> Self::Context;

    /// Compute the mix and final hashes for a header within a context.
    fn hash(
        &self,
        context: &Self::Context,
        height: u64,
        header_hash: &Hash256,
        nonce64: u64,
    ) -> ProgPowMix;

    /// The library's own boundary verification: confirm that the seal
    /// (mix hash, nonce) hashes below `boundary` within the context.
    fn verify(
        &self,
        context: &Self::Context,
        height: u64,
        header_hash: &Hash256,
        mix_hash: &Hash256,
        nonce64: u64,
        boundary: &Hash256,
    ) -> bool;
}

/// ProgPow verifier with a per-instance epoch-context memo.
///
/// The memo is local to this verifier, not shared across instances: two
/// threads straddling an epoch boundary on separate verifiers each build
/// their own context, which is correct but not work-shared. Within one
/// instance the memo lock also serializes hashing, bounding memory to a
/// single live context.
pub struct ProgPowVerifier<E: ProgPowEngine> {
    engine: E,
    context: Mutex<Option<(u64, E::Context)>>,
}

impl<E: ProgPowEngine> ProgPowVerifier<E> {
    /// Wrap an engine with an empty context memo.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            context: Mutex::new(None),
        }
    }

    /// Access the wrapped engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Check whether `header` satisfies the ProgPow requirement claimed by
    /// `bits`.
    ///
    /// Rejects on any invalid target encoding, otherwise recomputes the
    /// ProgPow hash within the header's epoch and accepts iff the library
    /// confirms the final hash against the decoded target reinterpreted as
    /// a boundary.
    pub fn verify<H: PowHeader>(&self, header: &H, bits: u32, params: &ConsensusParams) -> bool {
        let Some(target) = compact::decode_checked(bits, &params.pow_limit) else {
            return false;
        };

        let height = header.height();
        let epoch = self.engine.epoch_number(height);

        let mut slot = self.context.lock();
        let stale = !matches!(&*slot, Some((cached, _)) if *cached == epoch);
        if stale {
            *slot = Some((epoch, self.engine.build_context(epoch)));
        }
        let Some((_, context)) = slot.as_ref() else {
            return false;
        };

        let header_hash = header.prog_pow_header_hash();
        let nonce64 = header.nonce64();
        let result = self.engine.hash(context, height, &header_hash, nonce64);

        let boundary = Hash256::from_u256(&target);
        self.engine.verify(
            context,
            height,
            &header_hash,
            &result.mix_hash,
            nonce64,
            &boundary,
        )
    }
}
