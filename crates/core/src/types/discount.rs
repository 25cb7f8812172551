//! Percentage discounts applied to minor-unit totals.

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`DiscountPercent`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("discount must be between 1 and 100 percent (got {0})")]
pub struct DiscountError(pub i32);

/// A whole-number percentage in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    /// Create a discount percentage.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError`] outside `1..=100`.
    pub fn new(percent: i32) -> Result<Self, DiscountError> {
        match u8::try_from(percent) {
            Ok(p @ 1..=100) => Ok(Self(p)),
            _ => Err(DiscountError(percent)),
        }
    }

    /// The percentage as an integer.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Discount amount for a non-negative minor-unit total, rounded half up.
    ///
    /// ```
    /// use cartwheel_core::DiscountPercent;
    ///
    /// let ten = DiscountPercent::new(10).unwrap();
    /// assert_eq!(ten.discount_on(2500), 250);
    /// assert_eq!(ten.discount_on(5), 1);
    /// ```
    #[must_use]
    pub const fn discount_on(self, total_minor: i64) -> i64 {
        if total_minor <= 0 {
            return 0;
        }
        (total_minor.saturating_mul(self.0 as i64) + 50) / 100
    }
}

impl TryFrom<i32> for DiscountPercent {
    type Error = DiscountError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountPercent> for i32 {
    fn from(percent: DiscountPercent) -> Self {
        Self::from(percent.0)
    }
}
