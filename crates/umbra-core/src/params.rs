//! Consensus parameters consumed by the PoW subsystem.

use primitive_types::U256;

use crate::compact;
use crate::constants::{
    DGW_PAST_BLOCKS, POW_TARGET_SPACING, PROGPOW_TARGET_SPACING,
};

/// Chain-level consensus parameters.
///
/// These are read-only inputs to the retargeter and the verifiers; which
/// parameter set applies is decided once at node startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusParams {
    /// Maximum (easiest) difficulty target. Any block claiming an easier
    /// target is invalid, and the retargeter clamps its output to this.
    pub pow_limit: U256,
    /// Disable retargeting entirely: the required work is always
    /// `pow_limit`. Only meaningful on isolated test networks.
    pub f_pow_no_retargeting: bool,
    /// Number of matching-type blocks the retargeter averages over.
    pub n_dgw_past_blocks: u32,
    /// Expected seconds per block for the legacy and RandomX families.
    pub n_pow_target_spacing: i64,
    /// Expected seconds per block for the ProgPow family.
    pub n_prog_pow_target_spacing: i64,
}

impl ConsensusParams {
    /// Production parameter set.
    ///
    /// The limit is defined by its compact encoding so that clamping the
    /// retargeter's output to it is lossless.
    pub fn mainnet() -> Self {
        Self {
            pow_limit: U256::from(0x0f_ffffu64) << (8usize * 27),
            f_pow_no_retargeting: false,
            n_dgw_past_blocks: DGW_PAST_BLOCKS,
            n_pow_target_spacing: POW_TARGET_SPACING,
            n_prog_pow_target_spacing: PROGPOW_TARGET_SPACING,
        }
    }

    /// Public test network: same rules as mainnet, easier floor.
    pub fn testnet() -> Self {
        Self {
            pow_limit: U256::from(0xffffu64) << (8usize * 28),
            ..Self::mainnet()
        }
    }

    /// Local regression-test network: trivial PoW, no retargeting.
    pub fn regtest() -> Self {
        Self {
            pow_limit: U256::from(0x7f_ffffu64) << (8usize * 29),
            f_pow_no_retargeting: true,
            ..Self::mainnet()
        }
    }

    /// The compact encoding of `pow_limit`.
    ///
    /// This is the value the retargeter returns in every fallback case
    /// (no retargeting, insufficient history).
    pub fn compact_pow_limit(&self) -> u32 {
        compact::encode(&self.pow_limit)
    }

    /// Expected seconds per block for the selected block population.
    pub fn target_spacing(&self, prog_pow: bool) -> i64 {
        if prog_pow {
            self.n_prog_pow_target_spacing
        } else {
            self.n_pow_target_spacing
        }
    }
}
