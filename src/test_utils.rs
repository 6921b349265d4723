//! Shared test utilities for `AttendanceBuddy`.
//!
//! This module provides common helper functions for setting up test databases,
//! creating classes and entries with sensible defaults, and an in-memory
//! remote store for sync tests.

use crate::{
    core::{
        attendance::{SavedEntry, SessionSubmission, save_session},
        class,
        sync::RemoteStore,
    },
    entities::{Session, attendance, class as class_entity},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes `tracing` output through the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates a test class with sensible defaults.
///
/// # Defaults
/// * `year_group`: "Year 7"
/// * `male`: 10
/// * `female`: 10
pub async fn create_test_class(db: &DatabaseConnection, code: &str) -> Result<class_entity::Model> {
    class::create_class(db, code, "Year 7", 10, 10).await
}

/// Saves one session's counts through the normal save path.
pub async fn save_test_entry(
    db: &DatabaseConnection,
    class_id: i64,
    date: NaiveDate,
    session: Session,
    males_present: u32,
    females_present: u32,
) -> Result<SavedEntry> {
    save_session(
        db,
        &SessionSubmission {
            date,
            session,
            class_id,
            males_present,
            females_present,
        },
    )
    .await
}

/// Shorthand for a calendar date in tests.
pub fn day(year: i32, month: u32, dayofmonth: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, dayofmonth).unwrap_or_default()
}

/// Unsaved class model with 10 male and 10 female students.
pub fn sample_class(id: i64, code: &str, year_group: &str) -> class_entity::Model {
    class_entity::Model {
        id,
        code: code.to_string(),
        year_group: year_group.to_string(),
        total: 20,
        male: 10,
        female: 10,
    }
}

/// Unsaved entry model, for tests of the pure calculations.
pub fn sample_entry(
    class_id: i64,
    date: NaiveDate,
    session: Session,
    males_present: u32,
    females_present: u32,
    total_males: u32,
    total_females: u32,
) -> attendance::Model {
    attendance::Model {
        id: 0,
        date,
        session,
        class_id,
        males_present,
        females_present,
        total_males,
        total_females,
        term_id: None,
        updated_at: date.and_hms_opt(8, 0, 0).unwrap_or_default(),
    }
}

/// Remote store that keeps documents in memory, or refuses every write.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    documents: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

impl MemoryRemote {
    /// Remote whose every write fails, as if offline.
    pub fn failing() -> Self {
        Self {
            documents: Mutex::default(),
            fail: true,
        }
    }

    /// Documents written so far as `(installation_id, key, payload)`.
    pub fn documents(&self) -> Vec<(String, String, String)> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }
}

impl RemoteStore for MemoryRemote {
    fn put(
        &self,
        installation_id: &str,
        key: &str,
        payload: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        let result = if self.fail {
            Err(Error::Remote {
                message: "remote store offline".to_string(),
            })
        } else {
            if let Ok(mut docs) = self.documents.lock() {
                docs.push((
                    installation_id.to_string(),
                    key.to_string(),
                    payload.to_string(),
                ));
            }
            Ok(())
        };
        std::future::ready(result)
    }
}
