//! Sync outbox entity - Locally committed documents waiting to be pushed to the
//! remote store.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pending remote write
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_outbox")]
pub struct Model {
    /// Unique identifier, also the push order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Document key on the remote side (e.g., `"attendance_AM_2026-03-02"`)
    pub key: String,
    /// JSON document to push
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    /// Number of failed push attempts so far
    pub attempts: u32,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// When the document was queued
    pub created_at: DateTime,
}

/// `SyncOutbox` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
