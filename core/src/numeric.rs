//! Numeric representation used by the tissue model.
//!
//! The engine runs on `f64`. The tissue model is generic over [`Real`], so
//! the same equations and constants can be evaluated with
//! [`rust_decimal::Decimal`] to check the float implementation against a
//! fixed point one.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};

/// Arithmetic plus the exponential function.
pub trait Real:
    Copy
    + Debug
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;

    fn exp(self) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    fn one() -> Self {
        Self::from_f64(1.0)
    }

    fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }
}

impl Real for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }
}

impl Real for Decimal {
    /// Values outside of the `Decimal` range saturate to `Decimal::MAX` or
    /// `Decimal::MIN`. NaN has no `Decimal` representation; the model only
    /// converts its constants, pressures and gradient factors, which are
    /// finite.
    fn from_f64(value: f64) -> Self {
        debug_assert!(!value.is_nan(), "NaN converted to Decimal");
        <Decimal as FromPrimitive>::from_f64(value).unwrap_or(if value.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        })
    }

    fn to_f64(self) -> f64 {
        <Decimal as ToPrimitive>::to_f64(&self).unwrap_or(f64::NAN)
    }

    fn exp(self) -> Self {
        MathematicalOps::exp_with_tolerance(&self, Decimal::new(1, 20))
    }
}

/// Round to 10 decimal places; keeps time and depth arithmetic stable
/// after many small steps.
#[inline]
pub fn round10(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_exp() {
        assert!((Real::exp(1.0_f64) - std::f64::consts::E).abs() < 1e-15);
        assert_eq!(<f64 as Real>::zero(), 0.0);
        assert_eq!(<f64 as Real>::one(), 1.0);
    }

    #[test]
    fn test_decimal_exp_matches_f64() {
        for x in [-2.5, -0.0113, 0.0, 0.5, 1.0] {
            let d = <Decimal as Real>::from_f64(x);
            let e = Real::to_f64(Real::exp(d));
            assert!(
                (e - x.exp()).abs() < 1e-12,
                "exp({x}): decimal={e}, f64={}",
                x.exp()
            );
        }
    }

    #[test]
    fn test_decimal_out_of_range_saturates() {
        assert_eq!(<Decimal as Real>::from_f64(1e40), Decimal::MAX);
        assert_eq!(<Decimal as Real>::from_f64(f64::INFINITY), Decimal::MAX);
        assert_eq!(<Decimal as Real>::from_f64(f64::NEG_INFINITY), Decimal::MIN);
        assert_eq!(<Decimal as Real>::from_f64(-2.5), Decimal::new(-25, 1));
    }

    #[test]
    fn test_max() {
        assert_eq!(Real::max(1.0_f64, 2.0), 2.0);
        let a = <Decimal as Real>::from_f64(3.5);
        let b = <Decimal as Real>::from_f64(-1.0);
        assert_eq!(Real::max(a, b), a);
    }

    #[test]
    fn test_round10() {
        assert_eq!(round10(114.00000000000001), 114.0);
        assert_eq!(round10(0.1 + 0.2), 0.3);
    }
}
