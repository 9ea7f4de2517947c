//! RandomX proof-of-work: key-block selection and the key cache.
//!
//! RandomX hashes are computed against a VM seeded with the hash of a
//! recent "key block". The key rotates every [`RANDOMX_KEY_CHANGE`] blocks,
//! with a [`RANDOMX_SWITCH_KEY`]-block grace window past each period
//! boundary during which the previous period's key is still used, so the
//! whole network does not reseed at exactly the same height.
//!
//! Key-block *selection* is pure chain arithmetic and always available;
//! the cache, the two VM handles, and the verifier need the RandomX
//! library and live behind the `randomx` feature.

use umbra_core::constants::{RANDOMX_KEY_CHANGE, RANDOMX_SWITCH_KEY};
use umbra_core::traits::ActiveChain;
use umbra_core::types::Hash256;

/// Height of the key block seeding RandomX for a block at `height`.
///
/// Within the first `RANDOMX_SWITCH_KEY` blocks of a period the previous
/// period's boundary is still the key; past the grace window the current
/// boundary takes over. Early heights resolve to 0 (genesis).
pub fn key_block_height(height: u64) -> u64 {
    let boundary = height - height % RANDOMX_KEY_CHANGE;
    if height > boundary + RANDOMX_SWITCH_KEY {
        boundary
    } else {
        boundary.saturating_sub(RANDOMX_KEY_CHANGE)
    }
}

/// Hash of the key block for a block at `height`.
///
/// Falls back to the genesis hash when the resolved key height is not yet
/// on the active chain (very early chain, or a pruned lookup miss).
pub fn select_key_block<C: ActiveChain>(chain: &C, height: u64) -> Hash256 {
    let key_height = key_block_height(height);
    if key_height > chain.tip_height() {
        return chain.genesis_hash();
    }
    chain
        .block_hash_at(key_height)
        .unwrap_or_else(|| chain.genesis_hash())
}

#[cfg(feature = "randomx")]
pub use cache::{check_randomx_proof_of_work, RandomXKeyCache};

#[cfg(feature = "randomx")]
mod cache {
    use parking_lot::{Mutex, RwLock};
    use randomx_rs::{RandomXCache, RandomXFlag, RandomXVM};
    use tracing::{debug, error, info};

    use umbra_core::compact;
    use umbra_core::constants::RANDOMX_HASH_SIZE;
    use umbra_core::error::RandomXError;
    use umbra_core::params::ConsensusParams;
    use umbra_core::traits::{ActiveChain, PowHeader};
    use umbra_core::types::Hash256;

    use super::{key_block_height, select_key_block};

    /// The allocated state: one cache shared by two VMs, all built from the
    /// same key block. Either this whole cluster exists or none of it does.
    struct KeyedVms {
        key_block: Hash256,
        // Separate handles so a background miner and the validation path
        // do not contend on one VM; both reference the same cache memory.
        vm_mining: Mutex<RandomXVM>,
        vm_validating: Mutex<RandomXVM>,
    }

    impl KeyedVms {
        fn build(key_block: Hash256) -> Result<Self, RandomXError> {
            let flags = RandomXFlag::get_recommended_flags();
            let cache = RandomXCache::new(flags, key_block.as_bytes())
                .map_err(|e| RandomXError::CacheAlloc(e.to_string()))?;
            let vm_mining = RandomXVM::new(flags, Some(cache.clone()), None)
                .map_err(|e| RandomXError::VmCreate(e.to_string()))?;
            let vm_validating = RandomXVM::new(flags, Some(cache), None)
                .map_err(|e| RandomXError::VmCreate(e.to_string()))?;
            Ok(Self {
                key_block,
                vm_mining: Mutex::new(vm_mining),
                vm_validating: Mutex::new(vm_validating),
            })
        }
    }

    /// Process-wide RandomX hashing context with key-block rotation.
    ///
    /// Rotation (and teardown) takes the write lock for the duration of
    /// destroy-and-reallocate; each hash computation holds the read lock
    /// plus its VM's mutex, so a VM is never destroyed mid-hash and
    /// ordinary mining and validation never serialize against each other —
    /// rotation is the only serialization point.
    pub struct RandomXKeyCache {
        state: RwLock<Option<KeyedVms>>,
        // Memoized key resolution: (key height, key block hash). Purely an
        // optimization; never holds a genesis-fallback entry.
        resolved_key: Mutex<Option<(u64, Hash256)>>,
    }

    impl Default for RandomXKeyCache {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RandomXKeyCache {
        /// An empty (uninitialized) cache. Nothing is allocated until
        /// [`init`](Self::init) or the first verification.
        pub fn new() -> Self {
            Self {
                state: RwLock::new(None),
                resolved_key: Mutex::new(None),
            }
        }

        /// Whether the cache cluster is currently allocated.
        pub fn is_initialized(&self) -> bool {
            self.state.read().is_some()
        }

        /// The key block the live cache was built from, if initialized.
        pub fn current_key_block(&self) -> Option<Hash256> {
            self.state.read().as_ref().map(|vms| vms.key_block)
        }

        /// Initialize the cache for a block at `height`. No-op if already
        /// initialized, even under a different key — rotation is
        /// [`ensure_key_for`](Self::ensure_key_for)'s job.
        pub fn init<C: ActiveChain>(&self, chain: &C, height: u64) -> Result<(), RandomXError> {
            if self.is_initialized() {
                return Ok(());
            }
            self.ensure_key_for(chain, height)
        }

        /// Make the cache current for a block at `height`: allocate on
        /// first use, rotate if the required key block differs from the
        /// live one, no-op otherwise.
        pub fn ensure_key_for<C: ActiveChain>(
            &self,
            chain: &C,
            height: u64,
        ) -> Result<(), RandomXError> {
            let required = self.resolve_key(chain, height);

            {
                let state = self.state.read();
                if let Some(vms) = state.as_ref() {
                    if vms.key_block == required {
                        return Ok(());
                    }
                }
            }

            let mut state = self.state.write();
            // Re-check: another thread may have rotated while we waited.
            if let Some(vms) = state.as_ref() {
                if vms.key_block == required {
                    return Ok(());
                }
                info!(old = %vms.key_block, new = %required, "rotating randomx key block");
            }

            // Drop the old cluster before allocating the new one; a
            // RandomX cache plus VMs is too large to hold twice.
            *state = None;
            *state = Some(KeyedVms::build(required)?);
            Ok(())
        }

        /// Destroy both VMs and release the cache. No-op if not
        /// initialized. Used on shutdown and internally by rotation.
        pub fn teardown(&self) {
            let mut state = self.state.write();
            if state.take().is_some() {
                debug!("randomx key cache torn down");
            }
        }

        /// RandomX hash of `input` on the validating VM.
        pub fn hash_validating(&self, input: &[u8]) -> Result<Hash256, RandomXError> {
            let state = self.state.read();
            let vms = state.as_ref().ok_or(RandomXError::NotInitialized)?;
            Self::vm_hash(&vms.vm_validating, input)
        }

        /// RandomX hash of `input` on the mining VM.
        pub fn hash_mining(&self, input: &[u8]) -> Result<Hash256, RandomXError> {
            let state = self.state.read();
            let vms = state.as_ref().ok_or(RandomXError::NotInitialized)?;
            Self::vm_hash(&vms.vm_mining, input)
        }

        /// RandomX hash of a 32-byte header blob for a block at `height`,
        /// ensuring the key is current first.
        pub fn block_hash<C: ActiveChain>(
            &self,
            chain: &C,
            height: u64,
            hash_blob: &Hash256,
        ) -> Result<Hash256, RandomXError> {
            self.ensure_key_for(chain, height)?;
            self.hash_validating(hash_blob.as_bytes())
        }

        fn vm_hash(vm: &Mutex<RandomXVM>, input: &[u8]) -> Result<Hash256, RandomXError> {
            let output = vm
                .lock()
                .calculate_hash(input)
                .map_err(|e| RandomXError::HashFailed(e.to_string()))?;
            if output.len() != RANDOMX_HASH_SIZE {
                return Err(RandomXError::BadHashLength { got: output.len() });
            }
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&output);
            Ok(Hash256(bytes))
        }

        fn resolve_key<C: ActiveChain>(&self, chain: &C, height: u64) -> Hash256 {
            let key_height = key_block_height(height);

            let mut memo = self.resolved_key.lock();
            if let Some((cached_height, cached_hash)) = *memo {
                if cached_height == key_height {
                    return cached_hash;
                }
            }

            let hash = select_key_block(chain, height);
            // Only memoize real lookups: a genesis fallback for a not-yet-
            // existing key height must be re-resolved once the chain grows.
            if key_height <= chain.tip_height() {
                *memo = Some((key_height, hash));
            }
            hash
        }
    }

    /// Check whether `header` satisfies the RandomX requirement claimed by
    /// `bits`.
    ///
    /// Drives the key cache first (lazy init plus rotation), rejects on an
    /// invalid target encoding, then accepts iff the RandomX hash of the
    /// header's hash blob, read as a 256-bit magnitude, is below the
    /// decoded target. A cache that cannot be prepared rejects the block:
    /// a node that cannot verify must not accept.
    pub fn check_randomx_proof_of_work<H, C>(
        cache: &RandomXKeyCache,
        chain: &C,
        header: &H,
        bits: u32,
        params: &ConsensusParams,
    ) -> bool
    where
        H: PowHeader,
        C: ActiveChain,
    {
        if let Err(err) = cache.ensure_key_for(chain, header.height()) {
            error!(%err, height = header.height(), "randomx key cache unavailable");
            return false;
        }

        let Some(target) = compact::decode_checked(bits, &params.pow_limit) else {
            return false;
        };

        match cache.hash_validating(header.randomx_header_hash().as_bytes()) {
            Ok(hash) => hash.to_u256() < target,
            Err(err) => {
                error!(%err, height = header.height(), "randomx hash failed");
                false
            }
        }
    }
}
