//! Minor-unit currency conversion at the billing boundary.
//!
//! Catalog prices are stored in major units (dollars) as they come out of the
//! catalog table; the billing provider only accepts integer minor units
//! (cents). All conversion goes through [`MinorUnits`] so the rounding rule
//! lives in exactly one place.

use serde::{Deserialize, Serialize};

/// An amount in the smallest currency unit (e.g. cents).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(pub i64);

impl MinorUnits {
    /// Convert a major-unit amount (e.g. 12.99 dollars) into minor units.
    ///
    /// Rounds half away from zero, matching `round(price * 100)` in the
    /// catalog management layer. Prices are non-negative in practice but the
    /// conversion does not assume it.
    pub fn from_major(amount: f64) -> Self {
        Self((amount * 100.0).round() as i64)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whole_dollar_amounts_convert_exactly() {
        assert_eq!(MinorUnits::from_major(10.0), MinorUnits(1000));
        assert_eq!(MinorUnits::from_major(0.0), MinorUnits(0));
    }

    #[test]
    fn fractional_cents_round_half_away_from_zero() {
        assert_eq!(MinorUnits::from_major(12.99), MinorUnits(1299));
        assert_eq!(MinorUnits::from_major(0.005), MinorUnits(1));
        assert_eq!(MinorUnits::from_major(19.995), MinorUnits(2000));
    }

    #[test]
    fn float_noise_does_not_shift_the_amount() {
        // 29.99 is not exactly representable; the rounding must absorb that.
        assert_eq!(MinorUnits::from_major(29.99), MinorUnits(2999));
        assert_eq!(MinorUnits::from_major(4.10), MinorUnits(410));
    }

    proptest! {
        /// Property: converting a whole number of cents is lossless.
        #[test]
        fn cent_amounts_round_trip(cents in 0i64..10_000_000) {
            let major = cents as f64 / 100.0;
            prop_assert_eq!(MinorUnits::from_major(major), MinorUnits(cents));
        }
    }
}
