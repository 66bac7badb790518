//! Temporal decay of credibility.
//!
//! A belief that has not been observed for a while should be easier to
//! replace. Credibility decays exponentially with a configurable half-life:
//!
//! `effective = stored × 0.5 ^ (elapsed_days / half_life_days)`
//!
//! Decay is computed at decision time and never written back to the store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::credibility::Credibility;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Result of applying decay to a stored credibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decay {
    /// Credibility after decay.
    pub effective: Credibility,
    /// Multiplier applied to the stored value, in `(0, 1]`.
    pub factor: f64,
    /// Absolute distance between `now` and `last_seen_at`, in days.
    pub elapsed_days: f64,
    /// `last_seen_at` lies after `now`.
    ///
    /// Elapsed time is still taken as an absolute value; callers decide what
    /// to do about clock skew.
    pub future_dated: bool,
}

/// Computes the effective credibility of a stored value at `now`.
///
/// `half_life_days` must be positive; that is checked once when the
/// configuration is validated, not here.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use kyrodrift::{decay::effective_credibility, Credibility};
///
/// let now = Utc::now();
/// let stored = Credibility::new(0.9).unwrap();
/// let d = effective_credibility(stored, now - Duration::days(180), now, 180.0);
/// assert!((d.effective.value() - 0.45).abs() < 1e-9);
/// ```
#[must_use]
pub fn effective_credibility(
    stored: Credibility,
    last_seen_at: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> Decay {
    let delta = now.signed_duration_since(last_seen_at);
    let future_dated = delta < chrono::Duration::zero();

    #[allow(clippy::cast_precision_loss)]
    let elapsed_days = (delta.num_milliseconds().unsigned_abs() as f64) / MILLIS_PER_DAY;

    let factor = 0.5f64.powf(elapsed_days / half_life_days);

    Decay {
        effective: stored.scaled(factor),
        factor,
        elapsed_days,
        future_dated,
    }
}
