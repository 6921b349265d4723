//! Rate calculation business logic.
//!
//! Converts raw present counts into whole-number percentages and classifies
//! them for display. Every function here is pure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest rate classified as [`RateStatus::Good`].
pub const GOOD_THRESHOLD: u32 = 90;
/// Lowest rate classified as [`RateStatus::Average`].
pub const AVERAGE_THRESHOLD: u32 = 75;

/// Rounds a non-negative ratio expressed in percent to the nearest whole number.
///
/// Halves round up. Inputs are never negative, so this equals half-away-from-zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn round_percent(value: f64) -> u32 {
    // Cast safety: callers only pass finite values in [0, u32::MAX].
    value.max(0.0).round() as u32
}

/// Percentage of `class_size` that `present` represents, rounded to the nearest integer.
///
/// A zero class size yields `0` rather than an error.
///
/// # Examples
/// ```
/// use attendance_buddy::core::rate::rate;
/// assert_eq!(rate(17, 20), 85);
/// assert_eq!(rate(5, 0), 0);
/// ```
#[must_use]
pub fn rate(present: u64, class_size: u64) -> u32 {
    if class_size == 0 {
        return 0;
    }

    #[allow(clippy::cast_precision_loss)] // Head counts are far below 2^52
    let percent = present as f64 * 100.0 / class_size as f64;
    round_percent(percent)
}

/// Daily rate from two already-rounded session rates: `round((am + pm) / 2)`.
///
/// This is the rate shown on reports. It can differ by one point from
/// [`combined_daily_rate`] because each session is rounded before averaging.
#[must_use]
pub fn daily_rate(am_rate: u32, pm_rate: u32) -> u32 {
    round_percent(f64::from(am_rate + pm_rate) / 2.0)
}

/// Daily rate from the raw counts of both sessions: present over possible seats.
#[must_use]
pub fn combined_daily_rate(am_present: u64, pm_present: u64, class_size: u64) -> u32 {
    rate(am_present + pm_present, class_size * 2)
}

/// Display class for an attendance rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateStatus {
    /// 90% and above
    Good,
    /// 75% up to 90%
    Average,
    /// Below 75%
    Poor,
}

impl RateStatus {
    /// Classifies `rate` against the fixed thresholds.
    #[must_use]
    pub const fn classify(rate: u32) -> Self {
        if rate >= GOOD_THRESHOLD {
            Self::Good
        } else if rate >= AVERAGE_THRESHOLD {
            Self::Average
        } else {
            Self::Poor
        }
    }

    /// Lower-case label used for styling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Average => "average",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for RateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
