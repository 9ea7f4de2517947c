//! Compact difficulty-target codec.
//!
//! A 256-bit difficulty target is packed into a 32-bit word: byte 0 is an
//! exponent (the target's size in bytes), bytes 1-3 are a big-endian
//! mantissa, and bit 23 of the mantissa field is a sign bit. The target is
//! `mantissa * 2^(8*(exponent-3))`.
//!
//! This layout is itself a consensus rule: every node on the network must
//! decode and encode it bit-for-bit identically, including the negative and
//! overflow classifications. Do not change any of it without a network-wide
//! upgrade.

use primitive_types::U256;

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Decode a compact target into `(value, negative, overflow)`.
///
/// `negative` is set when the mantissa is nonzero and the sign bit is set.
/// `overflow` is set when the shifted mantissa would exceed 256 bits.
/// The returned value is meaningless when either flag is set; callers must
/// treat such encodings as invalid.
pub fn decode(bits: u32) -> (U256, bool, bool) {
    let size = bits >> 24;
    let word = bits & MANTISSA_MASK;

    let value = if size <= 3 {
        U256::from(word >> (8 * (3 - size)))
    } else {
        // Shifts past 256 bits truncate to zero; the overflow flag below is
        // what marks the encoding invalid.
        U256::from(word) << (8 * (size - 3)) as usize
    };

    let negative = word != 0 && (bits & SIGN_BIT) != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

    (value, negative, overflow)
}

/// Encode a 256-bit target in normalized compact form.
///
/// Chooses the minimal exponent/mantissa pair for the magnitude and never
/// sets the sign bit (targets are unsigned).
pub fn encode(value: &U256) -> u32 {
    let mut size = (value.bits() + 7) / 8;
    let mut compact = if size <= 3 {
        (value.low_u64() << (8 * (3 - size))) as u32
    } else {
        (*value >> (8 * (size - 3))).low_u64() as u32
    };

    // A mantissa with bit 23 set would read back as negative; shift it into
    // the next exponent instead.
    if compact & SIGN_BIT != 0 {
        compact >>= 8;
        size += 1;
    }

    compact | ((size as u32) << 24)
}

/// Check that `bits` decodes to a usable target: not negative, not
/// overflowed, nonzero, and within the network's maximum target.
pub fn is_valid(bits: u32, pow_limit: &U256) -> bool {
    decode_checked(bits, pow_limit).is_some()
}

/// Decode `bits`, returning the target only if it passes every validity
/// rule. All PoW checks share this single classification; the caller never
/// learns which sub-condition failed.
pub fn decode_checked(bits: u32, pow_limit: &U256) -> Option<U256> {
    let (value, negative, overflow) = decode(bits);
    if negative || overflow || value.is_zero() || value > *pow_limit {
        return None;
    }
    Some(value)
}
