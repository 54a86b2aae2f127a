//! Q16.16 fixed-point helpers for the sensor transfer functions.
//!
//! The small parts this runs on have no FPU, and the AVR builds have no
//! usable soft-float budget either, so the thermistor math is done in
//! integers.  Intermediates are widened to `i64` before any multiply or
//! divide.

/// Fixed-point value with 16 fractional bits.
pub type Q16 = i64;

pub const FRAC_BITS: u32 = 16;
pub const ONE: Q16 = 1 << FRAC_BITS;

/// ln(2) in Q16.16.
const LN2: Q16 = 45_426;

pub const fn from_int(v: i64) -> Q16 {
    v << FRAC_BITS
}

/// Build a Q16 value from a number expressed in hundredths (e.g. 29815 for 298.15).
pub const fn from_centi(v: i64) -> Q16 {
    (v << FRAC_BITS) / 100
}

/// Round to the nearest integer, halves away from zero.
pub const fn round(v: Q16) -> i64 {
    if v >= 0 {
        (v + ONE / 2) >> FRAC_BITS
    } else {
        -((-v + ONE / 2) >> FRAC_BITS)
    }
}

pub const fn mul(a: Q16, b: Q16) -> Q16 {
    (a * b) >> FRAC_BITS
}

/// `a / b`.  Returns `None` on division by zero.
pub const fn div(a: Q16, b: Q16) -> Option<Q16> {
    if b == 0 {
        None
    } else {
        Some((a << FRAC_BITS) / b)
    }
}

/// Base-2 logarithm of a positive integer, in Q16.16.
///
/// The integer part comes from the bit length; the fraction is refined by
/// repeated squaring of the normalised mantissa.  Zero has no logarithm.
pub fn log2(x: u32) -> Option<Q16> {
    if x == 0 {
        return None;
    }
    let msb = 31 - x.leading_zeros();
    // Mantissa in [1, 2) as Q16.
    let mut m: u64 = if msb >= FRAC_BITS {
        u64::from(x >> (msb - FRAC_BITS))
    } else {
        u64::from(x) << (FRAC_BITS - msb)
    };
    let mut result: Q16 = from_int(i64::from(msb));
    for bit in (0..FRAC_BITS).rev() {
        m = (m * m) >> FRAC_BITS;
        if m >= 2 << FRAC_BITS {
            m >>= 1;
            result |= 1 << bit;
        }
    }
    Some(result)
}

/// Natural logarithm of a positive integer, in Q16.16.
pub fn ln(x: u32) -> Option<Q16> {
    log2(x).map(|l| mul(l, LN2))
}
