//! Cumulative and historical-average business logic.
//!
//! Lifetime statistics per class, used to compare a class's rate today with
//! its own track record. [`compute_cumulative`] and
//! [`compute_historical_averages`] rescan every entry and are the reference
//! results; [`CumulativeLedger`] keeps the same numbers up to date one entry
//! at a time.

use crate::{
    core::{
        rate::{rate, round_percent},
        summary::AttendanceFigures,
    },
    entities::attendance,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Percentage change beyond which today's rate counts as a trend.
pub const TREND_THRESHOLD_PERCENT: f64 = 5.0;

/// Lifetime totals for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeStat {
    /// Students present, summed over every entry
    pub present: u64,
    /// Number of entries (sessions) recorded
    pub sessions: u64,
}

/// Present count and entry count of one class's entries that share a class size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SizeBucket {
    present: u64,
    entries: u64,
}

/// Entries of one class grouped by class size. Integer only, so adding and
/// removing entries is exact in any order.
type SizeBuckets = BTreeMap<u32, SizeBucket>;

fn add_to_buckets<R: AttendanceFigures>(buckets: &mut SizeBuckets, record: &R) {
    let bucket = buckets.entry(record.class_size()).or_default();
    bucket.present += u64::from(record.total_present());
    bucket.entries += 1;
}

/// Sums present counts and session counts per class.
#[must_use]
pub fn compute_cumulative(entries: &[attendance::Model]) -> BTreeMap<i64, CumulativeStat> {
    let mut stats: BTreeMap<i64, CumulativeStat> = BTreeMap::new();
    for entry in entries {
        let stat = stats.entry(entry.class_id).or_default();
        stat.present += u64::from(entry.total_present());
        stat.sessions += 1;
    }
    stats
}

/// Mean per-entry rate per class, rounded to the nearest integer.
///
/// The mean is computed as an exact fraction, so a mean of exactly `x.5`
/// always rounds up. An entry with class size 0 contributes a rate of 0.
#[must_use]
pub fn compute_historical_averages(entries: &[attendance::Model]) -> BTreeMap<i64, u32> {
    let mut classes: BTreeMap<i64, SizeBuckets> = BTreeMap::new();
    for entry in entries {
        add_to_buckets(classes.entry(entry.class_id).or_default(), entry);
    }

    classes
        .into_iter()
        .map(|(class_id, buckets)| (class_id, mean_rate(&buckets)))
        .collect()
}

const fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// `round(100 * mean(present / size))` over every entry in `buckets`.
fn mean_rate(buckets: &SizeBuckets) -> u32 {
    let entries: u64 = buckets.values().map(|b| b.entries).sum();
    if entries == 0 {
        return 0;
    }
    exact_mean_rate(buckets, entries).unwrap_or_else(|| approximate_mean_rate(buckets, entries))
}

/// Exact rational mean over the common multiple of the class sizes. `None`
/// when the intermediate values don't fit in `u128`.
fn exact_mean_rate(buckets: &SizeBuckets, entries: u64) -> Option<u32> {
    let mut common: u128 = 1;
    for &size in buckets.keys().filter(|&&size| size > 0) {
        let size = u128::from(size);
        common = (common / gcd(common, size)).checked_mul(size)?;
    }

    let mut numerator: u128 = 0;
    for (&size, bucket) in buckets.iter().filter(|&(&size, _)| size > 0) {
        let term = u128::from(bucket.present)
            .checked_mul(common / u128::from(size))?
            .checked_mul(100)?;
        numerator = numerator.checked_add(term)?;
    }
    let denominator = common.checked_mul(u128::from(entries))?;

    // Half up: floor((2n + d) / 2d)
    let rounded = numerator
        .checked_mul(2)?
        .checked_add(denominator)?
        / denominator.checked_mul(2)?;
    Some(u32::try_from(rounded).unwrap_or(u32::MAX))
}

#[allow(clippy::cast_precision_loss)] // Only reached for rosters with huge, coprime sizes
fn approximate_mean_rate(buckets: &SizeBuckets, entries: u64) -> u32 {
    let rate_sum: f64 = buckets
        .iter()
        .filter(|&(&size, _)| size > 0)
        .map(|(&size, b)| b.present as f64 * 100.0 / f64::from(size))
        .sum();
    round_percent(rate_sum / entries as f64)
}

/// Direction of today's rate against the historical average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// More than 5% above the average
    Positive,
    /// Within 5% of the average
    Neutral,
    /// More than 5% below the average
    Negative,
}

impl Trend {
    /// Relative change of `today_rate` against `historical_average`, in percent.
    ///
    /// Undefined, and therefore `None`, when there is no average to compare with.
    #[must_use]
    pub fn delta_percent(today_rate: u32, historical_average: u32) -> Option<f64> {
        if historical_average == 0 {
            return None;
        }
        let avg = f64::from(historical_average);
        Some((f64::from(today_rate) - avg) / avg * 100.0)
    }

    /// Classifies today's rate against the class's historical average.
    #[must_use]
    pub fn classify(today_rate: u32, historical_average: u32) -> Option<Self> {
        Self::delta_percent(today_rate, historical_average).map(|delta| {
            if delta > TREND_THRESHOLD_PERCENT {
                Self::Positive
            } else if delta < -TREND_THRESHOLD_PERCENT {
                Self::Negative
            } else {
                Self::Neutral
            }
        })
    }

    /// Lower-case label used for styling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running totals for one class inside a [`CumulativeLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ClassTally {
    present: u64,
    sessions: u64,
    buckets: SizeBuckets,
}

/// Incrementally maintained cumulative stats and historical averages.
///
/// Applying every entry of a set gives the same result as
/// [`compute_cumulative`] and [`compute_historical_averages`] over that set,
/// whatever the order. When an entry is overwritten, retract the stored
/// version before applying the new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CumulativeLedger {
    tallies: BTreeMap<i64, ClassTally>,
}

impl CumulativeLedger {
    /// Ledger seeded from a full scan of `entries`.
    #[must_use]
    pub fn from_entries(entries: &[attendance::Model]) -> Self {
        let mut ledger = Self::default();
        for entry in entries {
            ledger.apply(entry);
        }
        ledger
    }

    /// Adds one entry to its class's totals.
    pub fn apply(&mut self, entry: &attendance::Model) {
        let tally = self.tallies.entry(entry.class_id).or_default();
        tally.present += u64::from(entry.total_present());
        tally.sessions += 1;
        add_to_buckets(&mut tally.buckets, entry);
    }

    /// Removes an entry previously passed to [`apply`](Self::apply).
    ///
    /// An entry that was never applied leaves the ledger unchanged.
    pub fn retract(&mut self, entry: &attendance::Model) {
        let present = u64::from(entry.total_present());
        let Some(tally) = self.tallies.get_mut(&entry.class_id) else {
            return;
        };
        let size = entry.class_size();
        let Some(bucket) = tally.buckets.get_mut(&size) else {
            return;
        };
        if bucket.entries == 0 || bucket.present < present {
            return;
        }

        bucket.present -= present;
        bucket.entries -= 1;
        if bucket.entries == 0 {
            tally.buckets.remove(&size);
        }
        tally.present = tally.present.saturating_sub(present);
        tally.sessions = tally.sessions.saturating_sub(1);
        if tally.sessions == 0 {
            self.tallies.remove(&entry.class_id);
        }
    }

    /// Lifetime totals for one class, if it has any entries.
    #[must_use]
    pub fn stat(&self, class_id: i64) -> Option<CumulativeStat> {
        self.tallies.get(&class_id).map(|t| CumulativeStat {
            present: t.present,
            sessions: t.sessions,
        })
    }

    /// Historical average for one class; 0 when it has no entries.
    #[must_use]
    pub fn historical_average(&self, class_id: i64) -> u32 {
        self.tallies
            .get(&class_id)
            .map_or(0, |t| mean_rate(&t.buckets))
    }

    /// Lifetime totals for every class.
    #[must_use]
    pub fn cumulative(&self) -> BTreeMap<i64, CumulativeStat> {
        self.tallies
            .keys()
            .filter_map(|&id| self.stat(id).map(|s| (id, s)))
            .collect()
    }

    /// Historical averages for every class.
    #[must_use]
    pub fn historical_averages(&self) -> BTreeMap<i64, u32> {
        self.tallies
            .keys()
            .map(|&id| (id, self.historical_average(id)))
            .collect()
    }

    /// Average attendance of a class's lifetime entries as a present/possible ratio.
    #[must_use]
    pub fn lifetime_rate(&self, class_id: i64, class_size: u32) -> u32 {
        self.stat(class_id).map_or(0, |s| {
            rate(s.present, s.sessions * u64::from(class_size))
        })
    }
}
