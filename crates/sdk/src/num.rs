//! Signed 80.48 fixed-point numbers.
//!
//! On-chain accounts store prices, funding bounds and fees as `I80F48`: a
//! 128-bit two's-complement integer holding `value * 2^48`. This module
//! provides an exact arithmetic type over that representation. Products and
//! quotients are computed on 256-bit intermediates and narrowed back, so no
//! precision is lost before the final rounding step.

use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use alloy_primitives::{I256, U256};

use crate::error::NumError;

const FRAC_BITS: u32 = 48;
const ONE_BITS: i128 = 1 << FRAC_BITS;
const FRAC_MASK: u128 = (1 << FRAC_BITS) - 1;
// 2^-48 == 5^48 / 10^48, so the fractional bits times 5^48 are the exact
// decimal digits of the fraction.
const FIVE_POW_48: u128 = 3_552_713_678_800_500_929_355_621_337_890_625;
const MAX_LITERAL_FRAC_DIGITS: usize = 60;

/// Signed fixed-point number with 80 integer and 48 fractional bits.
///
/// Addition, subtraction, multiplication and negation saturate at
/// [`I80F48::MIN`]/[`I80F48::MAX`]; division is the only fallible
/// operation. Multiplication rounds toward negative infinity, division
/// truncates toward zero.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct I80F48(i128);

impl I80F48 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(ONE_BITS);
    pub const MIN: Self = Self(i128::MIN);
    pub const MAX: Self = Self(i128::MAX);
    /// Number of fractional bits.
    pub const FRAC_BITS: u32 = FRAC_BITS;
    /// Encoded size in bytes.
    pub const LEN: usize = 16;

    /// Wraps raw bits (`value * 2^48`).
    pub const fn from_bits(bits: i128) -> Self { Self(bits) }

    /// Raw bits (`value * 2^48`).
    pub const fn to_bits(self) -> i128 { self.0 }

    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self { Self(i128::from_le_bytes(bytes)) }

    pub const fn to_le_bytes(self) -> [u8; 16] { self.0.to_le_bytes() }

    /// Exact conversion of an integer. Every `i64` fits into 80 integer bits.
    pub const fn from_int(n: i64) -> Self { Self((n as i128) << FRAC_BITS) }

    /// Conversion of a wide integer, saturating outside of the 80-bit
    /// integer range.
    pub fn from_i128(n: i128) -> Self {
        let limit = i128::MAX >> FRAC_BITS;
        if n > limit {
            Self::MAX
        } else if n < -limit - 1 {
            Self::MIN
        } else {
            Self(n << FRAC_BITS)
        }
    }

    /// Nearest representable value below `value`, saturating at the bounds.
    /// `NaN` maps to zero.
    pub fn from_f64(value: f64) -> Self { Self((value * ONE_BITS as f64).floor() as i128) }

    pub fn to_f64(self) -> f64 { self.0 as f64 / ONE_BITS as f64 }

    pub fn is_positive(self) -> bool { self.0 > 0 }

    pub fn is_negative(self) -> bool { self.0 < 0 }

    pub fn is_zero(self) -> bool { self.0 == 0 }

    pub fn abs(self) -> Self { Self(self.0.saturating_abs()) }

    pub fn min(self, other: Self) -> Self { Ord::min(self, other) }

    pub fn max(self, other: Self) -> Self { Ord::max(self, other) }

    /// Integer part, rounded toward negative infinity.
    pub fn floor_to_int(self) -> i128 { self.0 >> FRAC_BITS }

    pub fn checked_add(self, rhs: Self) -> Option<Self> { self.0.checked_add(rhs.0).map(Self) }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> { self.0.checked_sub(rhs.0).map(Self) }

    /// Product, or `None` if it does not fit into 128 bits.
    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let product = widen(self.0) * widen(rhs.0);
        narrow(product.asr(FRAC_BITS as usize)).map(Self)
    }

    /// Quotient truncated toward zero, saturating on overflow.
    pub fn checked_div(self, rhs: Self) -> Result<Self, NumError> {
        if rhs.is_zero() {
            return Err(NumError::DivisionByZero);
        }
        let quotient = (widen(self.0) * widen(ONE_BITS)) / widen(rhs.0);
        Ok(narrow(quotient).map(Self).unwrap_or_else(|| self.saturated(rhs)))
    }

    /// Multiplies by `10^exp`, dividing (toward zero) when `exp` is negative.
    /// Saturates on overflow.
    pub fn mul_pow10(self, exp: i32) -> Self { Self::scaled(widen(self.0), exp) }

    /// Exact `mantissa * 10^exp`, rounded toward zero to the nearest multiple
    /// of `2^-48` and saturating on overflow.
    pub fn from_scaled(mantissa: i128, exp: i32) -> Self {
        Self::scaled(widen(mantissa) * widen(ONE_BITS), exp)
    }

    fn scaled(bits: I256, exp: i32) -> Self {
        let saturated = if bits.is_negative() { Self::MIN } else { Self::MAX };
        let Some(factor) = pow10(exp.unsigned_abs()) else {
            return if exp < 0 { Self::ZERO } else { saturated };
        };
        let result = if exp >= 0 { bits.checked_mul(factor) } else { bits.checked_div(factor) };
        result.and_then(narrow).map(Self).unwrap_or(saturated)
    }

    fn saturated(self, rhs: Self) -> Self {
        if self.is_negative() == rhs.is_negative() { Self::MAX } else { Self::MIN }
    }
}

fn widen(value: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 { -magnitude } else { magnitude }
}

fn narrow(value: I256) -> Option<i128> { i128::try_from(value).ok() }

/// `10^exp` as a 256-bit integer, `None` past 10^76.
fn pow10(exp: u32) -> Option<I256> {
    let ten = widen(10);
    (0..exp).try_fold(widen(1), |acc, _| acc.checked_mul(ten))
}

impl Add for I80F48 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self { Self(self.0.saturating_add(rhs.0)) }
}

impl AddAssign for I80F48 {
    fn add_assign(&mut self, rhs: Self) { *self = *self + rhs; }
}

impl Sub for I80F48 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self { Self(self.0.saturating_sub(rhs.0)) }
}

impl SubAssign for I80F48 {
    fn sub_assign(&mut self, rhs: Self) { *self = *self - rhs; }
}

impl Mul for I80F48 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self { self.checked_mul(rhs).unwrap_or_else(|| self.saturated(rhs)) }
}

impl Neg for I80F48 {
    type Output = Self;

    fn neg(self) -> Self { Self(self.0.saturating_neg()) }
}

impl From<i64> for I80F48 {
    fn from(value: i64) -> Self { Self::from_int(value) }
}

impl PartialEq<i64> for I80F48 {
    fn eq(&self, other: &i64) -> bool { *self == Self::from_int(*other) }
}

impl PartialOrd<i64> for I80F48 {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        Some(self.cmp(&Self::from_int(*other)))
    }
}

/// Exact decimal rendering, without trailing fractional zeros.
impl fmt::Display for I80F48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        let int_part = magnitude >> FRAC_BITS;
        let frac_bits = magnitude & FRAC_MASK;
        let sign = if self.0 < 0 { "-" } else { "" };
        if frac_bits == 0 {
            return write!(f, "{sign}{int_part}");
        }
        let frac_digits = (U256::from(frac_bits) * U256::from(FIVE_POW_48)).to_string();
        let frac = format!("{:0>48}", frac_digits);
        write!(f, "{sign}{int_part}.{}", frac.trim_end_matches('0'))
    }
}

impl fmt::Debug for I80F48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "I80F48({self})") }
}

/// Parses `[-+]digits[.digits]`. The fraction is rounded toward zero to the
/// nearest multiple of `2^-48`; digits past the 60th are ignored.
impl FromStr for I80F48 {
    type Err = NumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NumError::InvalidLiteral(s.to_string());
        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (int_str, frac_str) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_str.is_empty() && frac_str.is_empty() {
            return Err(invalid());
        }
        if !int_str.bytes().chain(frac_str.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let int_part: u128 = if int_str.is_empty() { 0 } else { int_str.parse().map_err(|_| invalid())? };
        if int_part > (i128::MAX >> FRAC_BITS) as u128 + u128::from(negative) {
            return Err(invalid());
        }

        let mut numerator = U256::ZERO;
        let mut denominator = U256::from(1u8);
        for digit in frac_str.bytes().take(MAX_LITERAL_FRAC_DIGITS) {
            numerator = numerator * U256::from(10u8) + U256::from(digit - b'0');
            denominator *= U256::from(10u8);
        }
        let frac_bits = (numerator * U256::from(ONE_BITS as u128) / denominator).as_limbs()[0];

        let magnitude = (int_part << FRAC_BITS) | u128::from(frac_bits);
        let bits = if negative {
            0i128.checked_sub_unsigned(magnitude).ok_or_else(invalid)?
        } else {
            i128::try_from(magnitude).map_err(|_| invalid())?
        };
        Ok(Self(bits))
    }
}
