//! Key-value store over the `system_state` table.
//!
//! Values are strings; the `_json` helpers store typed values as JSON. Derived
//! caches live under fixed keys so reports can be read without a rescan.

use crate::{
    core::cumulative::{CumulativeLedger, CumulativeStat},
    entities::{Session, SystemState, system_state},
    errors::Result,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Set, prelude::*};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Key of the cached per-class cumulative stats.
pub const CUMULATIVE_STATS_KEY: &str = "cumulative_stats";
/// Key of the cached per-class historical averages.
pub const HISTORICAL_AVERAGES_KEY: &str = "historical_averages";

/// Per-date key for one session's entries, e.g. `attendance_AM_2026-03-02`.
#[must_use]
pub fn attendance_key(session: Session, date: NaiveDate) -> String {
    format!("attendance_{}_{}", session, date.format("%Y-%m-%d"))
}

async fn find_row<C>(db: &C, key: &str) -> Result<Option<system_state::Model>>
where
    C: ConnectionTrait,
{
    SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Value stored under `key`, or `default` when nothing is stored.
pub async fn get<C>(db: &C, key: &str, default: &str) -> Result<String>
where
    C: ConnectionTrait,
{
    Ok(find_row(db, key)
        .await?
        .map_or_else(|| default.to_string(), |row| row.value))
}

/// Stores `value` under `key`, replacing any previous value.
pub async fn set<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    if let Some(row) = find_row(db, key).await? {
        let mut active_model: system_state::ActiveModel = row.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_row = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        new_row.insert(db).await?;
    }

    trace!("Stored {} bytes under {key}", value.len());
    Ok(())
}

/// Deletes `key`. Returns whether anything was stored under it.
pub async fn remove<C>(db: &C, key: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = SystemState::delete_many()
        .filter(system_state::Column::Key.eq(key))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Typed value stored under `key` as JSON.
pub async fn get_json<T, C>(db: &C, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    C: ConnectionTrait,
{
    match find_row(db, key).await? {
        Some(row) => Ok(Some(serde_json::from_str(&row.value)?)),
        None => Ok(None),
    }
}

/// Stores `value` under `key` as JSON.
pub async fn set_json<T, C>(db: &C, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    C: ConnectionTrait,
{
    let encoded = serde_json::to_string(value)?;
    set(db, key, &encoded).await
}

/// Writes the ledger's cumulative stats and historical averages to their cache keys.
pub async fn save_stat_caches<C>(db: &C, ledger: &CumulativeLedger) -> Result<()>
where
    C: ConnectionTrait,
{
    set_json(db, CUMULATIVE_STATS_KEY, &ledger.cumulative()).await?;
    set_json(db, HISTORICAL_AVERAGES_KEY, &ledger.historical_averages()).await?;
    debug!("Refreshed cumulative and historical-average caches");
    Ok(())
}

/// Cached cumulative stats, empty when never written.
pub async fn load_cumulative_cache<C>(db: &C) -> Result<BTreeMap<i64, CumulativeStat>>
where
    C: ConnectionTrait,
{
    Ok(get_json(db, CUMULATIVE_STATS_KEY).await?.unwrap_or_default())
}

/// Cached historical averages, empty when never written.
pub async fn load_historical_average_cache<C>(db: &C) -> Result<BTreeMap<i64, u32>>
where
    C: ConnectionTrait,
{
    Ok(get_json(db, HISTORICAL_AVERAGES_KEY).await?.unwrap_or_default())
}
