//! Fixed-point scalar types.
//!
//! Outline coordinates live in 26.6 pixels; scale ratios and matrix entries
//! live in 16.16. The two are never implicitly convertible: mixing them in
//! one expression is a bug the type system should catch, not a cast the
//! compiler should quietly perform.

use core::ops::{Add, Sub, Neg};

/// A 26.6 signed fixed-point pixel coordinate (64 units per pixel).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct F26Dot6(pub i32);

impl F26Dot6 {
    pub const ZERO: F26Dot6 = F26Dot6(0);
    pub const ONE: F26Dot6 = F26Dot6(64);

    #[inline]
    pub fn from_int(v: i32) -> Self {
        F26Dot6(v * 64)
    }

    #[inline]
    pub fn from_f32(v: f32) -> Self {
        F26Dot6((v * 64.0).round() as i32)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 64.0
    }

    #[inline]
    pub fn floor(self) -> i32 {
        self.0 >> 6
    }

    #[inline]
    pub fn round(self) -> i32 {
        (self.0 + 32) >> 6
    }

    #[inline]
    pub fn ceil(self) -> i32 {
        (self.0 + 63) >> 6
    }

    /// Multiplies by a 16.16 ratio, rounding to the nearest 26.6 unit.
    #[inline]
    pub fn mul_fixed(self, scale: F16Dot16) -> F26Dot6 {
        let product = self.0 as i64 * scale.0 as i64;
        F26Dot6(((product + (1 << 15)) >> 16) as i32)
    }
}

impl Add for F26Dot6 {
    type Output = F26Dot6;
    #[inline]
    fn add(self, rhs: F26Dot6) -> F26Dot6 { F26Dot6(self.0 + rhs.0) }
}

impl Sub for F26Dot6 {
    type Output = F26Dot6;
    #[inline]
    fn sub(self, rhs: F26Dot6) -> F26Dot6 { F26Dot6(self.0 - rhs.0) }
}

impl Neg for F26Dot6 {
    type Output = F26Dot6;
    #[inline]
    fn neg(self) -> F26Dot6 { F26Dot6(-self.0) }
}

/// A 16.16 signed fixed-point ratio (65536 units per whole).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct F16Dot16(pub i32);

impl F16Dot16 {
    pub const ONE: F16Dot16 = F16Dot16(1 << 16);

    #[inline]
    pub fn from_f32(v: f32) -> Self {
        F16Dot16((v * 65536.0).round() as i32)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 65536.0
    }

    /// Ratio of two integers, as used when deriving a ppem/units-per-em scale.
    #[inline]
    pub fn from_ratio(numerator: i32, denominator: i32) -> Self {
        F16Dot16(((numerator as i64) << 16).checked_div(denominator as i64).unwrap_or(0) as i32)
    }

    #[inline]
    pub fn mul(self, rhs: F16Dot16) -> F16Dot16 {
        let product = self.0 as i64 * rhs.0 as i64;
        F16Dot16((product >> 16) as i32)
    }

    #[inline]
    pub fn div(self, rhs: F16Dot16) -> F16Dot16 {
        if rhs.0 == 0 {
            return F16Dot16(0);
        }
        let numerator = (self.0 as i64) << 16;
        F16Dot16((numerator / rhs.0 as i64) as i32)
    }

    /// 16.16 fixed-point square root (Newton-Raphson, a handful of steps
    /// suffice because the inputs are bounded by glyph coordinate ranges).
    #[inline]
    pub fn sqrt(self) -> F16Dot16 {
        if self.0 <= 0 {
            return F16Dot16(0);
        }
        let mut x = self.0 as i64;
        let mut guess = x;
        for _ in 0..24 {
            if guess == 0 {
                break;
            }
            guess = (guess + (x << 16) / guess) / 2;
        }
        x = guess;
        F16Dot16(x as i32)
    }
}

impl Add for F16Dot16 {
    type Output = F16Dot16;
    #[inline]
    fn add(self, rhs: F16Dot16) -> F16Dot16 { F16Dot16(self.0 + rhs.0) }
}

impl Sub for F16Dot16 {
    type Output = F16Dot16;
    #[inline]
    fn sub(self, rhs: F16Dot16) -> F16Dot16 { F16Dot16(self.0 - rhs.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f26dot6_roundtrip() {
        assert_eq!(F26Dot6::from_int(1).0, 64);
        assert_eq!(F26Dot6::from_f32(1.0).round(), 1);
    }

    #[test]
    fn f16dot16_ratio() {
        let scale = F16Dot16::from_ratio(10, 1000); // 10 ppem / 1000 upem
        let px = F26Dot6::from_int(100).mul_fixed(scale);
        assert_eq!(px.to_f32(), 1.0);
    }

    #[test]
    fn f16dot16_sqrt() {
        let four = F16Dot16::from_f32(4.0);
        let root = four.sqrt();
        assert!((root.to_f32() - 2.0).abs() < 0.01);
    }
}
