//! Aggregate summary business logic.
//!
//! Reduces any collection of attendance entries to a single [`AttendanceSummary`].
//! The builder does not filter; callers narrow the set first with a [`RecordFilter`].

use crate::{
    core::rate::rate,
    entities::{Session, attendance, class, term},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Counts a record must expose to be summarized.
pub trait AttendanceFigures {
    /// Day the counts were taken
    fn date(&self) -> NaiveDate;
    /// Male students present
    fn males_present(&self) -> u32;
    /// Female students present
    fn females_present(&self) -> u32;
    /// Enrolled male students
    fn total_males(&self) -> u32;
    /// Enrolled female students
    fn total_females(&self) -> u32;

    /// Students present across both genders
    fn total_present(&self) -> u32 {
        self.males_present() + self.females_present()
    }

    /// Enrolled students across both genders
    fn class_size(&self) -> u32 {
        self.total_males() + self.total_females()
    }
}

impl AttendanceFigures for attendance::Model {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn males_present(&self) -> u32 {
        self.males_present
    }

    fn females_present(&self) -> u32 {
        self.females_present
    }

    fn total_males(&self) -> u32 {
        self.total_males
    }

    fn total_females(&self) -> u32 {
        self.total_females
    }
}

/// Summary statistics over a set of attendance entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    /// Number of entries summarized
    pub total_records: usize,
    /// Number of distinct dates among the entries
    pub total_days: usize,
    /// Students present, summed over entries
    pub total_present: u64,
    /// Class sizes, summed over entries
    pub total_possible: u64,
    /// `total_present / total_possible` as a rounded percentage
    pub average_attendance: u32,
    /// Male present over male possible as a rounded percentage
    pub male_attendance: u32,
    /// Female present over female possible as a rounded percentage
    pub female_attendance: u32,
}

/// Builds the summary block for `records`. An empty slice gives an all-zero summary.
#[must_use]
pub fn summarize<R: AttendanceFigures>(records: &[R]) -> AttendanceSummary {
    let mut days = HashSet::new();
    let mut total_present = 0_u64;
    let mut total_possible = 0_u64;
    let mut males_present = 0_u64;
    let mut males_possible = 0_u64;
    let mut females_present = 0_u64;
    let mut females_possible = 0_u64;

    for record in records {
        days.insert(record.date());
        total_present += u64::from(record.total_present());
        total_possible += u64::from(record.class_size());
        males_present += u64::from(record.males_present());
        males_possible += u64::from(record.total_males());
        females_present += u64::from(record.females_present());
        females_possible += u64::from(record.total_females());
    }

    AttendanceSummary {
        total_records: records.len(),
        total_days: days.len(),
        total_present,
        total_possible,
        average_attendance: rate(total_present, total_possible),
        male_attendance: rate(males_present, males_possible),
        female_attendance: rate(females_present, females_possible),
    }
}

/// Selection criteria applied before summarizing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only entries dated inside this term
    pub term_id: Option<i64>,
    /// Only entries in this one-based week of `term_id`; ignored without a term
    pub week: Option<u32>,
    /// Only entries on or after this date
    pub from: Option<NaiveDate>,
    /// Only entries on or before this date
    pub to: Option<NaiveDate>,
    /// Only entries for this class
    pub class_id: Option<i64>,
    /// Only entries for classes with this year-group label
    pub year_group: Option<String>,
    /// Only entries for this session
    pub session: Option<Session>,
}

impl RecordFilter {
    /// Returns the entries of `entries` that satisfy every set criterion.
    ///
    /// `classes` resolves year groups and `terms` resolves the term window. An
    /// unknown term matches no entries; an entry whose class is missing from
    /// `classes` never matches a year-group criterion.
    #[must_use]
    pub fn apply<'a>(
        &self,
        entries: &'a [attendance::Model],
        classes: &[class::Model],
        terms: &[term::Model],
    ) -> Vec<&'a attendance::Model> {
        let year_groups: HashMap<i64, &str> = classes
            .iter()
            .map(|c| (c.id, c.year_group.as_str()))
            .collect();

        let term = match self.term_id {
            Some(id) => match terms.iter().find(|t| t.id == id) {
                Some(t) => Some(t),
                None => return Vec::new(),
            },
            None => None,
        };

        entries
            .iter()
            .filter(|entry| {
                if let Some(term) = term {
                    if !term.contains(entry.date) {
                        return false;
                    }
                    if let Some(week) = self.week {
                        if term.week_of(entry.date) != Some(week) {
                            return false;
                        }
                    }
                }
                if self.from.is_some_and(|from| entry.date < from) {
                    return false;
                }
                if self.to.is_some_and(|to| entry.date > to) {
                    return false;
                }
                if self.class_id.is_some_and(|id| entry.class_id != id) {
                    return false;
                }
                if self.session.is_some_and(|s| entry.session != s) {
                    return false;
                }
                if let Some(year_group) = self.year_group.as_deref() {
                    if year_groups.get(&entry.class_id).copied() != Some(year_group) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }
}

impl<T: AttendanceFigures> AttendanceFigures for &T {
    fn date(&self) -> NaiveDate {
        (*self).date()
    }

    fn males_present(&self) -> u32 {
        (*self).males_present()
    }

    fn females_present(&self) -> u32 {
        (*self).females_present()
    }

    fn total_males(&self) -> u32 {
        (*self).total_males()
    }

    fn total_females(&self) -> u32 {
        (*self).total_females()
    }
}
