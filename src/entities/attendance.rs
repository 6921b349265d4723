//! Attendance entity - One saved session count for one class on one date.
//!
//! Entries are unique per (date, session, class). Re-saving the same triple
//! overwrites the stored counts. The class's gender totals are copied onto the
//! entry when it is saved so later roster edits don't rewrite history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two daily attendance-taking windows.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, DeriveActiveEnum,
    Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Session {
    /// Morning session
    #[sea_orm(string_value = "AM")]
    #[serde(rename = "AM")]
    Am,
    /// Afternoon session
    #[sea_orm(string_value = "PM")]
    #[serde(rename = "PM")]
    Pm,
}

impl Session {
    /// Upper-case label used in storage keys and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Pm => "PM",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Session {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Self::Am),
            "PM" => Ok(Self::Pm),
            other => Err(crate::errors::Error::validation(format!(
                "Unknown session '{other}', expected AM or PM"
            ))),
        }
    }
}

/// Attendance entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// School day the counts belong to
    pub date: Date,
    /// AM or PM
    pub session: Session,
    /// ID of the class the counts were taken for
    pub class_id: i64,
    /// Male students present, never above `total_males`
    pub males_present: u32,
    /// Female students present, never above `total_females`
    pub females_present: u32,
    /// Class male enrolment when the entry was saved
    pub total_males: u32,
    /// Class female enrolment when the entry was saved
    pub total_females: u32,
    /// Term that was active when the entry was saved
    pub term_id: Option<i64>,
    /// When the entry was last written
    pub updated_at: DateTime,
}

/// Defines relationships between Attendance and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one class
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
