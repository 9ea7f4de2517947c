//! DarkGravityWave difficulty retargeting.
//!
//! Retargets every block against a rolling window of the most recent
//! [`n_dgw_past_blocks`](umbra_core::params::ConsensusParams::n_dgw_past_blocks)
//! blocks *of the same population*: proof-of-work, proof-of-stake, and
//! ProgPow blocks each retarget independently, selected by the two flags
//! every entry point takes.
//!
//! The new target is the window's mean target scaled by the ratio of actual
//! to expected timespan, with the ratio clamped to [1/3, 3] per cycle and
//! the result clamped to the network's maximum target.
//!
//! All 256-bit arithmetic wraps on overflow, matching the fixed-width
//! unsigned arithmetic every other node performs on this code path.

use primitive_types::U256;
use tracing::debug;

use umbra_core::compact;
use umbra_core::params::ConsensusParams;
use umbra_core::traits::BlockIndex;

/// Required compact target for the block after `tip`.
///
/// `tip` is the chain tip *before* the candidate block. The two selectors
/// identify which block population the candidate belongs to.
pub fn next_work_required<B: BlockIndex>(
    tip: &B,
    params: &ConsensusParams,
    want_proof_of_stake: bool,
    want_prog_pow: bool,
) -> u32 {
    if params.f_pow_no_retargeting {
        return params.compact_pow_limit();
    }

    dark_gravity_wave(tip, params, want_proof_of_stake, want_prog_pow)
}

/// DarkGravityWave v3 over the selected block population.
///
/// Returns the compact encoding of `pow_limit` when fewer than
/// `n_dgw_past_blocks` matching blocks exist (bootstrap near genesis).
pub fn dark_gravity_wave<B: BlockIndex>(
    tip: &B,
    params: &ConsensusParams,
    want_proof_of_stake: bool,
    want_prog_pow: bool,
) -> u32 {
    if want_prog_pow {
        debug!(tip_height = tip.height(), "retargeting ProgPow population");
    }

    let mut cursor = Some(tip.clone());
    let mut newest_match: Option<B> = None;
    let mut past_target_avg = U256::zero();
    let mut count: u32 = 0;

    // Walk backward until the window holds exactly n_dgw_past_blocks
    // matching blocks; the loop leaves `oldest` at the last one collected.
    let oldest = loop {
        let Some(block) = cursor else {
            return params.compact_pow_limit();
        };

        if block.is_proof_of_stake() != want_proof_of_stake
            || block.is_prog_proof_of_work() != want_prog_pow
        {
            cursor = block.prev();
            continue;
        }

        if newest_match.is_none() {
            newest_match = Some(block.clone());
        }

        // Running mean in 256-bit precision, one block at a time.
        let (target, _, _) = compact::decode(block.bits());
        let (scaled, _) = past_target_avg.overflowing_mul(U256::from(count));
        let (sum, _) = scaled.overflowing_add(target);
        past_target_avg = sum / U256::from(count + 1);

        count += 1;
        if count == params.n_dgw_past_blocks {
            break block;
        }
        cursor = block.prev();
    };

    // The window end snaps back to the tip whenever any matching block was
    // found. This started as the first-stake-block bootstrap correction but
    // is written unconditionally; kept bit-for-bit, see the regression test.
    let window_end = if newest_match.is_some() {
        tip.clone()
    } else {
        oldest.clone()
    };

    let spacing = params.target_spacing(want_prog_pow);
    let target_timespan = i64::from(params.n_dgw_past_blocks) * spacing;
    let actual_timespan =
        (window_end.time() - oldest.time()).clamp(target_timespan / 3, target_timespan * 3);

    let (scaled, _) = past_target_avg.overflowing_mul(U256::from(actual_timespan as u64));
    let mut new_target = scaled / U256::from(target_timespan as u64);

    if new_target > params.pow_limit {
        new_target = params.pow_limit;
    }

    compact::encode(&new_target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::types::Hash256;

    // ------------------------------------------------------------------
    // Test chain: a Vec-backed block index
    // ------------------------------------------------------------------

    struct BlockData {
        time: i64,
        bits: u32,
        proof_of_stake: bool,
        prog_pow: bool,
    }

    #[derive(Clone)]
    struct ChainView<'a> {
        chain: &'a [BlockData],
        idx: usize,
    }

    impl BlockIndex for ChainView<'_> {
        fn height(&self) -> u64 {
            self.idx as u64
        }

        fn time(&self) -> i64 {
            self.chain[self.idx].time
        }

        fn bits(&self) -> u32 {
            self.chain[self.idx].bits
        }

        fn is_proof_of_stake(&self) -> bool {
            self.chain[self.idx].proof_of_stake
        }

        fn is_prog_proof_of_work(&self) -> bool {
            self.chain[self.idx].prog_pow
        }

        fn block_hash(&self) -> Hash256 {
            let mut bytes = [0u8; 32];
            bytes[24..].copy_from_slice(&(self.idx as u64).to_be_bytes());
            Hash256(bytes)
        }

        fn prev(&self) -> Option<Self> {
            self.idx.checked_sub(1).map(|idx| ChainView {
                chain: self.chain,
                idx,
            })
        }
    }

    fn tip(chain: &[BlockData]) -> ChainView<'_> {
        ChainView {
            chain,
            idx: chain.len() - 1,
        }
    }

    /// `count` PoW blocks with identical `bits`, spaced `spacing` seconds.
    fn uniform_pow_chain(count: usize, bits: u32, spacing: i64) -> Vec<BlockData> {
        (0..count)
            .map(|i| BlockData {
                time: 1_000_000 + i as i64 * spacing,
                bits,
                proof_of_stake: false,
                prog_pow: false,
            })
            .collect()
    }

    const TEST_BITS: u32 = 0x1c0f_ffff;

    fn mainnet() -> ConsensusParams {
        ConsensusParams::mainnet()
    }

    /// The retarget arithmetic, spelled out for expected values.
    fn retargeted(bits: u32, actual: i64, expected: i64) -> u32 {
        let (target, _, _) = compact::decode(bits);
        compact::encode(&(target * U256::from(actual as u64) / U256::from(expected as u64)))
    }

    // ------------------------------------------------------------------
    // Fallbacks
    // ------------------------------------------------------------------

    #[test]
    fn no_retargeting_returns_pow_limit() {
        let params = ConsensusParams::regtest();
        let chain = uniform_pow_chain(64, TEST_BITS, 1);
        assert_eq!(
            next_work_required(&tip(&chain), &params, false, false),
            params.compact_pow_limit()
        );
    }

    #[test]
    fn insufficient_history_returns_pow_limit() {
        let params = mainnet();
        let chain = uniform_pow_chain(params.n_dgw_past_blocks as usize - 1, TEST_BITS, 600);
        assert_eq!(
            dark_gravity_wave(&tip(&chain), &params, false, false),
            params.compact_pow_limit()
        );
    }

    #[test]
    fn insufficient_matching_history_returns_pow_limit() {
        // Plenty of blocks, but none of the requested population.
        let params = mainnet();
        let chain = uniform_pow_chain(100, TEST_BITS, 600);
        assert_eq!(
            dark_gravity_wave(&tip(&chain), &params, true, false),
            params.compact_pow_limit()
        );
    }

    // ------------------------------------------------------------------
    // Window arithmetic
    // ------------------------------------------------------------------

    #[test]
    fn steady_state_window() {
        // Exactly n blocks at exact spacing: the window spans n-1 intervals,
        // so the ratio is (n-1)/n.
        let params = mainnet();
        let n = params.n_dgw_past_blocks as i64;
        let chain = uniform_pow_chain(n as usize, TEST_BITS, params.n_pow_target_spacing);

        let bits = dark_gravity_wave(&tip(&chain), &params, false, false);
        let expected = retargeted(
            TEST_BITS,
            (n - 1) * params.n_pow_target_spacing,
            n * params.n_pow_target_spacing,
        );
        assert_eq!(bits, expected);
    }

    #[test]
    fn doubled_spacing_eases_target() {
        let params = mainnet();
        let n = params.n_dgw_past_blocks as i64;
        let chain = uniform_pow_chain(n as usize, TEST_BITS, params.n_pow_target_spacing * 2);

        let bits = dark_gravity_wave(&tip(&chain), &params, false, false);
        let expected = retargeted(
            TEST_BITS,
            (n - 1) * params.n_pow_target_spacing * 2,
            n * params.n_pow_target_spacing,
        );
        assert_eq!(bits, expected);

        let (new_target, _, _) = compact::decode(bits);
        let (old_target, _, _) = compact::decode(TEST_BITS);
        assert!(new_target > old_target, "slow blocks must ease the target");
    }

    #[test]
    fn fast_blocks_harden_target() {
        let params = mainnet();
        let n = params.n_dgw_past_blocks as usize;
        let chain = uniform_pow_chain(n, TEST_BITS, params.n_pow_target_spacing / 2);

        let bits = dark_gravity_wave(&tip(&chain), &params, false, false);
        let (new_target, _, _) = compact::decode(bits);
        let (old_target, _, _) = compact::decode(TEST_BITS);
        assert!(new_target < old_target);
    }

    #[test]
    fn upper_clamp_caps_at_three_x() {
        // 10x spacing: the raw ratio would be ~9.6, clamped to 3.
        let params = mainnet();
        let n = params.n_dgw_past_blocks as usize;
        let chain = uniform_pow_chain(n, TEST_BITS, params.n_pow_target_spacing * 10);

        let bits = dark_gravity_wave(&tip(&chain), &params, false, false);
        let (target, _, _) = compact::decode(TEST_BITS);
        assert_eq!(bits, compact::encode(&(target * U256::from(3u64))));
    }

    #[test]
    fn lower_clamp_caps_at_one_third() {
        // All blocks at the same instant: the raw timespan is 0, clamped to
        // a third of expected.
        let params = mainnet();
        let n = params.n_dgw_past_blocks as usize;
        let chain = uniform_pow_chain(n, TEST_BITS, 0);

        let bits = dark_gravity_wave(&tip(&chain), &params, false, false);
        let (target, _, _) = compact::decode(TEST_BITS);
        assert_eq!(bits, compact::encode(&(target / U256::from(3u64))));
    }

    #[test]
    fn output_never_exceeds_pow_limit() {
        // Blocks already at the limit and 10x slow: the scaled target would
        // exceed the limit and must clamp to it.
        let params = mainnet();
        let n = params.n_dgw_past_blocks as usize;
        let chain =
            uniform_pow_chain(n, params.compact_pow_limit(), params.n_pow_target_spacing * 10);

        assert_eq!(
            dark_gravity_wave(&tip(&chain), &params, false, false),
            params.compact_pow_limit()
        );
    }

    // ------------------------------------------------------------------
    // Population filtering
    // ------------------------------------------------------------------

    #[test]
    fn skips_other_populations() {
        // Interleave PoS blocks carrying garbage bits between the PoW
        // blocks; they must not contaminate the PoW retarget.
        let params = mainnet();
        let n = params.n_dgw_past_blocks as usize;
        let spacing = params.n_pow_target_spacing;

        let mut chain = Vec::new();
        for i in 0..n {
            chain.push(BlockData {
                time: 1_000_000 + i as i64 * spacing,
                bits: TEST_BITS,
                proof_of_stake: false,
                prog_pow: false,
            });
            chain.push(BlockData {
                time: 1_000_000 + i as i64 * spacing + 1,
                bits: 0x1d7f_ffff,
                proof_of_stake: true,
                prog_pow: false,
            });
        }
        // Keep the tip itself a PoW block so the window end is unaffected
        // by the snap-to-tip behavior tested separately below.
        chain.push(BlockData {
            time: 1_000_000 + n as i64 * spacing,
            bits: TEST_BITS,
            proof_of_stake: false,
            prog_pow: false,
        });

        let bits = dark_gravity_wave(&tip(&chain), &params, false, false);
        // Window: PoW blocks at indices n..1, evenly spaced.
        let expected = retargeted(
            TEST_BITS,
            (n as i64 - 1) * spacing,
            n as i64 * spacing,
        );
        assert_eq!(bits, expected);
    }

    #[test]
    fn progpow_population_uses_progpow_spacing() {
        let params = mainnet();
        let n = params.n_dgw_past_blocks as usize;
        let spacing = params.n_prog_pow_target_spacing;
        let chain: Vec<BlockData> = (0..n)
            .map(|i| BlockData {
                time: 1_000_000 + i as i64 * spacing,
                bits: TEST_BITS,
                proof_of_stake: false,
                prog_pow: true,
            })
            .collect();

        let bits = dark_gravity_wave(&tip(&chain), &params, false, true);
        let expected = retargeted(
            TEST_BITS,
            (n as i64 - 1) * spacing,
            n as i64 * spacing,
        );
        assert_eq!(bits, expected);
    }

    // ------------------------------------------------------------------
    // Window-end snap regression
    // ------------------------------------------------------------------

    #[test]
    fn window_end_snaps_to_tip() {
        // A PoS block at the tip, far in the future of the newest PoW
        // block. The PoW retarget window nonetheless ends at the tip, so
        // the huge gap counts as PoW timespan and the clamp kicks in.
        let params = mainnet();
        let n = params.n_dgw_past_blocks as usize;
        let spacing = params.n_pow_target_spacing;
        let mut chain = uniform_pow_chain(n, TEST_BITS, spacing);
        chain.push(BlockData {
            time: chain[n - 1].time + 50_000,
            bits: 0x1d7f_ffff,
            proof_of_stake: true,
            prog_pow: false,
        });

        let bits = dark_gravity_wave(&tip(&chain), &params, false, false);
        let (target, _, _) = compact::decode(TEST_BITS);
        // actual = (n-1)*spacing + 50_000 = 63_800, clamped to 3x expected.
        assert_eq!(bits, compact::encode(&(target * U256::from(3u64))));
    }
}
