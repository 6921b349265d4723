//! Class entity - A teaching group whose attendance is recorded.
//!
//! Each class is identified by its display code and year-group label. The total
//! enrolment is always the sum of the male and female counts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    /// Unique identifier for the class
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display code (e.g., "7A", "Form 3B")
    pub code: String,
    /// Year-group label (e.g., "Year 7")
    pub year_group: String,
    /// Total enrolled students, kept equal to `male + female`
    pub total: u32,
    /// Enrolled male students
    pub male: u32,
    /// Enrolled female students
    pub female: u32,
}

impl Model {
    /// Enrolment used as the denominator for every rate of this class.
    #[must_use]
    pub const fn class_size(&self) -> u32 {
        self.male + self.female
    }
}

/// Defines relationships between Class and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One class has many attendance entries
    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendance,
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
