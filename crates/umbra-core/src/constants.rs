//! Protocol constants for the proof-of-work subsystem.

/// RandomX key rotation period in blocks. The key block for a height is the
/// block at the start of its period, subject to the grace window below.
pub const RANDOMX_KEY_CHANGE: u64 = 2048;

/// RandomX key grace window in blocks. A new period's key block is not
/// adopted until this many blocks past the period boundary, so the whole
/// network does not rotate at exactly the same height.
pub const RANDOMX_SWITCH_KEY: u64 = 64;

/// Expected size of a RandomX hash output in bytes.
pub const RANDOMX_HASH_SIZE: usize = 32;

/// Number of matching-type blocks averaged by the DarkGravityWave retargeter.
pub const DGW_PAST_BLOCKS: u32 = 24;

/// Expected seconds per block for the legacy and RandomX PoW families.
pub const POW_TARGET_SPACING: i64 = 600;

/// Expected seconds per block for the ProgPow family.
pub const PROGPOW_TARGET_SPACING: i64 = 172;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_window_is_shorter_than_period() {
        assert!(RANDOMX_SWITCH_KEY < RANDOMX_KEY_CHANGE);
    }

    #[test]
    fn retarget_window_nonzero() {
        assert!(DGW_PAST_BLOCKS > 0);
        assert!(POW_TARGET_SPACING > 0);
        assert!(PROGPOW_TARGET_SPACING > 0);
    }
}
