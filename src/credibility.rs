//! Credibility values.
//!
//! Credibility is the stored confidence of a belief about a user's behavior.
//! It is always a finite value in `[0.0, 1.0]`; the constructor is the only
//! way to build one, so every `Credibility` in the system is valid.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A validated credibility score in `[0.0, 1.0]`.
///
/// # Examples
///
/// ```
/// use kyrodrift::Credibility;
///
/// let c = Credibility::new(0.8).unwrap();
/// assert_eq!(c.value(), 0.8);
/// assert!(Credibility::new(1.2).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Credibility(f64);

impl Credibility {
    /// Minimum valid credibility value.
    pub const MIN_VALUE: f64 = 0.0;

    /// Maximum valid credibility value.
    pub const MAX_VALUE: f64 = 1.0;

    /// Creates a credibility with validation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::CredibilityOutOfRange` if the value is NaN or
    /// not in `[0.0, 1.0]`.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || !(Self::MIN_VALUE..=Self::MAX_VALUE).contains(&value) {
            return Err(ValidationError::CredibilityOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Zero credibility.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0.0)
    }

    /// Full credibility.
    #[must_use]
    pub const fn one() -> Self {
        Self(1.0)
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// The larger of two credibilities.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }

    /// Scales this credibility by a factor in `[0.0, 1.0]`.
    ///
    /// Factors outside that range are clamped so the result stays valid.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        Self(self.0 * factor)
    }
}

impl Default for Credibility {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Credibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<f64> for Credibility {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Credibility {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Credibility::new(raw).map_err(serde::de::Error::custom)
    }
}
