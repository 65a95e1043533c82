//! `long double` encoding
//!
//! Rust has no native `long double`, so values travel as `f64` and are
//! re-encoded into the platform's format. Every f64 encodes exactly; decoding
//! rounds to the nearest f64, ties to even.

/// Platform representation of C `long double`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongDoubleFormat {
    /// Same as `double`
    Double,
    /// x87 80-bit extended precision, stored in 12 or 16 bytes
    X87Extended,
    /// IEEE 754 binary128
    Quad,
}

#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(target_env = "msvc")))]
pub const NATIVE_FORMAT: LongDoubleFormat = LongDoubleFormat::X87Extended;

#[cfg(all(
    any(target_arch = "aarch64", target_arch = "riscv64", target_arch = "s390x"),
    not(any(target_vendor = "apple", target_os = "windows"))
))]
pub const NATIVE_FORMAT: LongDoubleFormat = LongDoubleFormat::Quad;

#[cfg(not(any(
    all(any(target_arch = "x86", target_arch = "x86_64"), not(target_env = "msvc")),
    all(
        any(target_arch = "aarch64", target_arch = "riscv64", target_arch = "s390x"),
        not(any(target_vendor = "apple", target_os = "windows"))
    )
)))]
pub const NATIVE_FORMAT: LongDoubleFormat = LongDoubleFormat::Double;

const F64_EXP_BIAS: i32 = 1023;
const WIDE_EXP_BIAS: i32 = 16383;
const WIDE_EXP_MAX: u16 = 0x7fff;

/// Format matching a `long double` slot of `size` bytes
pub fn format_for_size(size: usize) -> Option<LongDoubleFormat> {
    match (NATIVE_FORMAT, size) {
        (_, 8) => Some(LongDoubleFormat::Double),
        (LongDoubleFormat::X87Extended, 12 | 16) => Some(LongDoubleFormat::X87Extended),
        (LongDoubleFormat::Quad, 16) => Some(LongDoubleFormat::Quad),
        _ => None,
    }
}

/// Split an f64 into (sign, unbiased exponent, 64-bit left-aligned significand)
///
/// Returns `None` for zero. The significand has its leading one in bit 63.
fn decompose(value: f64) -> Option<(bool, i32, u64)> {
    let bits = value.to_bits();
    let sign = bits >> 63 != 0;
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);

    if exp == 0 {
        if frac == 0 {
            return None;
        }
        // subnormal: normalise
        let lead = 63 - frac.leading_zeros() as i32;
        let significand = frac << (63 - lead);
        return Some((sign, lead - 1074, significand));
    }
    Some((sign, exp - F64_EXP_BIAS, (1u64 << 63) | (frac << 11)))
}

/// value * 2^exp without intermediate overflow or underflow
fn scale(mut value: f64, mut exp: i32) -> f64 {
    let up = f64::from_bits(((F64_EXP_BIAS + 1000) as u64) << 52);
    let down = f64::from_bits(((F64_EXP_BIAS - 1000) as u64) << 52);
    while exp > 1000 {
        value *= up;
        exp -= 1000;
    }
    while exp < -1000 {
        value *= down;
        exp += 1000;
    }
    value * f64::from_bits(((F64_EXP_BIAS + exp) as u64) << 52)
}

/// `significand * 2^exp` rounded to the nearest f64, ties to even
///
/// Overflow yields infinity and values below half the smallest subnormal
/// yield zero.
fn round_to_f64(significand: u128, exp: i32) -> f64 {
    if significand == 0 {
        return 0.0;
    }
    let lead = 127 - significand.leading_zeros() as i32;
    let magnitude = lead + exp;
    // Subnormal results keep fewer than 53 bits.
    let keep = if magnitude >= 1 - F64_EXP_BIAS {
        53
    } else {
        magnitude + 1075
    };
    if keep < 0 {
        return 0.0;
    }

    let drop = lead + 1 - keep;
    if drop <= 0 {
        return scale(significand as u64 as f64, exp);
    }
    let drop = drop as u32;
    let mut top = significand.checked_shr(drop).unwrap_or(0);
    let rest = if drop >= 128 {
        significand
    } else {
        significand & ((1u128 << drop) - 1)
    };
    let half = 1u128 << (drop - 1);
    if rest > half || (rest == half && top & 1 == 1) {
        // A carry out of 53 bits is still exact as f64 and scales correctly.
        top += 1;
    }
    scale(top as u64 as f64, exp + drop as i32)
}

/// Encode into x87 extended layout: 64-bit significand then sign/exponent
pub fn to_x87(value: f64) -> [u8; 10] {
    let sign = if value.is_sign_negative() { 0x8000u16 } else { 0 };
    let (se, significand) = if value.is_nan() {
        let frac = value.to_bits() & ((1u64 << 52) - 1);
        (WIDE_EXP_MAX, (1u64 << 63) | (frac << 11) | (1u64 << 62))
    } else if value.is_infinite() {
        (WIDE_EXP_MAX, 1u64 << 63)
    } else {
        match decompose(value) {
            None => (0, 0),
            Some((_, exp, significand)) => ((exp + WIDE_EXP_BIAS) as u16, significand),
        }
    };

    let mut out = [0u8; 10];
    out[..8].copy_from_slice(&significand.to_le_bytes());
    out[8..].copy_from_slice(&(sign | se).to_le_bytes());
    out
}

/// Decode x87 extended layout
pub fn from_x87(bytes: &[u8; 10]) -> f64 {
    let mut lo = [0u8; 8];
    lo.copy_from_slice(&bytes[..8]);
    let significand = u64::from_le_bytes(lo);
    let se = u16::from_le_bytes([bytes[8], bytes[9]]);
    let negative = se & 0x8000 != 0;
    let exp = se & WIDE_EXP_MAX;

    let magnitude = if exp == WIDE_EXP_MAX {
        if significand << 1 == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        let unbiased = if exp == 0 { 1 - WIDE_EXP_BIAS } else { exp as i32 - WIDE_EXP_BIAS };
        round_to_f64(significand as u128, unbiased - 63)
    };

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode as IEEE binary128, little-endian
pub fn to_quad(value: f64) -> [u8; 16] {
    let sign = (value.is_sign_negative() as u128) << 127;
    let body = if value.is_nan() {
        let frac = (value.to_bits() & ((1u64 << 52) - 1)) as u128;
        ((WIDE_EXP_MAX as u128) << 112) | (frac << 60) | (1u128 << 111)
    } else if value.is_infinite() {
        (WIDE_EXP_MAX as u128) << 112
    } else {
        match decompose(value) {
            None => 0,
            Some((_, exp, significand)) => {
                // drop the explicit leading one, keep 112 fraction bits
                let frac = ((significand << 1) as u128) << 48;
                (((exp + WIDE_EXP_BIAS) as u128) << 112) | frac
            }
        }
    };
    (sign | body).to_le_bytes()
}

/// Decode IEEE binary128, rounding to double precision
pub fn from_quad(bytes: &[u8; 16]) -> f64 {
    let bits = u128::from_le_bytes(*bytes);
    let negative = bits >> 127 != 0;
    let exp = ((bits >> 112) as u16) & WIDE_EXP_MAX;
    let frac = bits & ((1u128 << 112) - 1);

    let magnitude = if exp == WIDE_EXP_MAX {
        if frac == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else if exp == 0 {
        round_to_f64(frac, 1 - WIDE_EXP_BIAS - 112)
    } else {
        round_to_f64((1u128 << 112) | frac, exp as i32 - WIDE_EXP_BIAS - 112)
    };

    if negative {
        -magnitude
    } else {
        magnitude
    }
}
