//! Bin labels used to build process and group identifiers
//!
//! Bin centers enter process names rounded to one decimal place
//! (`helXsec_L_y_0.2_qt_1.5`). [`Decimal1`] keeps that rounded value as an
//! integer count of tenths so identifiers can be compared field by field and
//! only rendered to text when written out. Two centers that round to the same
//! tenth compare equal, which is the collision behaviour the identifiers have
//! always had. Negative centers that round to zero keep their sign and render
//! as `-0.0`, a label distinct from `0.0`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value rounded to one decimal place, stored as tenths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Decimal1 {
    tenths: i64,
    /// Set for negative values that round to zero
    #[serde(default)]
    negative_zero: bool,
}

impl Decimal1 {
    /// Round a finite value to one decimal place
    ///
    /// Rounding goes through the shortest exact decimal expansion with ties to
    /// even, so `0.15` (stored as `0.1499…`) becomes `0.1`.
    pub fn round(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!(
                "cannot label non-finite bin center {value}"
            )));
        }
        let text = format!("{value:.1}");
        let negative = text.starts_with('-');
        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
        let magnitude: i64 = digits
            .parse()
            .map_err(|_| Error::InvalidInput(format!("bin center {value} out of range")))?;
        Ok(Self {
            tenths: if negative { -magnitude } else { magnitude },
            negative_zero: negative && magnitude == 0,
        })
    }

    /// Round every value of a slice
    pub fn round_all(values: &[f64]) -> Result<Vec<Self>> {
        values.iter().map(|&v| Self::round(v)).collect()
    }

    /// Raw count of tenths
    pub fn tenths(&self) -> i64 {
        self.tenths
    }

    /// Whether this is a negative value rounded to zero
    pub fn is_negative_zero(&self) -> bool {
        self.negative_zero
    }

    /// The rounded value as a float
    pub fn value(&self) -> f64 {
        if self.negative_zero {
            -0.0
        } else {
            self.tenths as f64 / 10.0
        }
    }
}

impl fmt::Display for Decimal1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tenths < 0 || self.negative_zero { "-" } else { "" };
        let magnitude = self.tenths.unsigned_abs();
        write!(f, "{sign}{}.{}", magnitude / 10, magnitude % 10)
    }
}

/// Render a float the way the histogram producer prints axis centers
///
/// Integral values keep a trailing `.0` (`1.0`), others use the shortest
/// representation that round-trips (`0.5`, `91.1876`).
pub fn float_label(value: f64) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_and_display() {
        let cases = [
            (0.2, "0.2"),
            (1.0, "1.0"),
            (10.0, "10.0"),
            (1.5, "1.5"),
            (2.34, "2.3"),
            (0.96, "1.0"),
            (-1.0, "-1.0"),
            (-0.45, "-0.5"),
            (123.04, "123.0"),
            (0.04, "0.0"),
            (0.0, "0.0"),
            (-0.04, "-0.0"),
            (-0.0, "-0.0"),
        ];
        for (value, expected) in cases {
            let d = Decimal1::round(value).unwrap();
            assert_eq!(d.to_string(), expected, "rounding {value}");
        }
    }

    #[test]
    fn test_collisions_compare_equal() {
        let a = Decimal1::round(0.21).unwrap();
        let b = Decimal1::round(0.24).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.tenths(), 2);
        assert!((a.value() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_negative_zero_is_its_own_label() {
        let negative = Decimal1::round(-0.04).unwrap();
        let positive = Decimal1::round(0.04).unwrap();
        assert!(negative.is_negative_zero());
        assert!(!positive.is_negative_zero());
        assert_eq!(negative.tenths(), 0);
        assert_ne!(negative, positive);
        assert_eq!(negative, Decimal1::round(-0.01).unwrap());
        assert!(negative.value().is_sign_negative());
        assert_eq!(format!("y_{negative}"), "y_-0.0");
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Decimal1::round(f64::NAN).is_err());
        assert!(Decimal1::round(f64::INFINITY).is_err());
    }

    #[test]
    fn test_float_label() {
        assert_eq!(float_label(0.5), "0.5");
        assert_eq!(float_label(1.0), "1.0");
        assert_eq!(float_label(-2.0), "-2.0");
        assert_eq!(float_label(91.1876), "91.1876");
    }

    proptest::proptest! {
        #[test]
        fn prop_tenths_are_stable(tenths in -100_000i64..100_000) {
            let d = Decimal1::round(tenths as f64 / 10.0).unwrap();
            proptest::prop_assert_eq!(d.tenths(), tenths);
        }
    }

    #[test]
    fn test_round_all() {
        let labels = Decimal1::round_all(&[0.2, 1.0]).unwrap();
        let rendered: Vec<String> = labels.iter().map(|d| d.to_string()).collect();
        assert_eq!(rendered, vec!["0.2", "1.0"]);
    }
}
