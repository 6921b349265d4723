//! Term entity - A named span of the school year used to label and filter records.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Term database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "terms")]
pub struct Model {
    /// Unique identifier for the term
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Term 1 2026")
    pub name: String,
    /// First day of the term
    pub start_date: Date,
    /// Last day of the term, inclusive
    pub end_date: Date,
    /// Planned number of teaching weeks
    pub weeks: u32,
    /// Whether new entries are labelled with this term
    pub is_active: bool,
}

impl Model {
    /// Whether `date` falls inside this term, both ends inclusive.
    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// One-based teaching week of `date`, counted in 7-day blocks from the start date.
    #[must_use]
    pub fn week_of(&self, date: Date) -> Option<u32> {
        if !self.contains(date) {
            return None;
        }
        let days = (date - self.start_date).num_days();
        u32::try_from(days / 7 + 1).ok()
    }
}

/// `Term` has no declared relationships; entries carry its id as a plain label
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
