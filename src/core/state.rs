//! Application state - The single writer for attendance data.
//!
//! [`TrackerState`] owns the database connection and the incrementally
//! maintained [`CumulativeLedger`]. Every mutation goes through a `&mut self`
//! method, which keeps the ledger, the stat caches and the sync outbox in step
//! with the stored entries. Each mutation commits in one transaction and the
//! in-memory ledger is swapped only after that commit.

use crate::{
    core::{
        attendance::{
            SavedEntry, SessionSubmission, delete_entry, get_all_entries,
            get_entries_for_session, save_session,
        },
        autocopy::SessionForm,
        class,
        cumulative::CumulativeLedger,
        report::{DailyReport, generate_daily_report},
        store::{attendance_key, save_stat_caches},
        sync::{RemoteStore, SyncReport, enqueue, flush_outbox},
        transfer::{ExportBundle, ImportMode, ImportReport, import_bundle},
    },
    entities::{Session, attendance},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

/// Document pushed to the remote store for one session of one date.
#[derive(Debug, Serialize)]
struct SessionDocument<'a> {
    date: NaiveDate,
    session: Session,
    entries: &'a [&'a attendance::Model],
}

type SessionSlot = (NaiveDate, Session);

/// Queues the current document for one session of one date. An empty
/// `entries` tells the remote that nothing is recorded there any more.
async fn enqueue_session_document<C>(
    db: &C,
    date: NaiveDate,
    session: Session,
    entries: &[&attendance::Model],
) -> Result<()>
where
    C: ConnectionTrait,
{
    let document = SessionDocument {
        date,
        session,
        entries,
    };
    enqueue(
        db,
        &attendance_key(session, date),
        &serde_json::to_string(&document)?,
    )
    .await?;
    Ok(())
}

fn group_by_session(
    entries: &[attendance::Model],
) -> BTreeMap<SessionSlot, Vec<&attendance::Model>> {
    let mut groups: BTreeMap<SessionSlot, Vec<&attendance::Model>> = BTreeMap::new();
    for entry in entries {
        groups.entry((entry.date, entry.session)).or_default().push(entry);
    }
    groups
}

/// Queues a document for every session whose entries differ between `before`
/// and `after`. Returns how many were queued.
async fn enqueue_changed_sessions<C>(
    db: &C,
    before: &[attendance::Model],
    after: &[attendance::Model],
) -> Result<usize>
where
    C: ConnectionTrait,
{
    let old = group_by_session(before);
    let new = group_by_session(after);
    let slots: BTreeSet<SessionSlot> = old.keys().chain(new.keys()).copied().collect();

    let mut queued = 0;
    for (date, session) in slots {
        let current = new.get(&(date, session));
        if old.get(&(date, session)) == current {
            continue;
        }
        let entries = current.map_or(&[][..], Vec::as_slice);
        enqueue_session_document(db, date, session, entries).await?;
        queued += 1;
    }
    Ok(queued)
}

/// Saves one submission inside `txn`, updates `ledger` and queues the
/// session's document.
async fn save_within(
    txn: &DatabaseTransaction,
    ledger: &mut CumulativeLedger,
    submission: &SessionSubmission,
) -> Result<SavedEntry> {
    let saved = save_session(txn, submission).await?;
    if let Some(previous) = &saved.previous {
        ledger.retract(previous);
    }
    ledger.apply(&saved.entry);

    let session_entries =
        get_entries_for_session(txn, submission.date, submission.session).await?;
    let refs: Vec<&attendance::Model> = session_entries.iter().collect();
    enqueue_session_document(txn, submission.date, submission.session, &refs).await?;
    Ok(saved)
}

/// Rebuilds the ledger from the entries now visible in `txn`, refreshes the
/// caches and queues documents for sessions that changed since `before`.
async fn refresh_within(
    txn: &DatabaseTransaction,
    before: &[attendance::Model],
) -> Result<CumulativeLedger> {
    let after = get_all_entries(txn).await?;
    let queued = enqueue_changed_sessions(txn, before, &after).await?;
    let ledger = CumulativeLedger::from_entries(&after);
    save_stat_caches(txn, &ledger).await?;
    debug!("Queued {queued} changed session document(s)");
    Ok(ledger)
}

/// Owns the connection and the derived statistics.
#[derive(Debug)]
pub struct TrackerState {
    db: DatabaseConnection,
    ledger: CumulativeLedger,
}

impl TrackerState {
    /// Loads every entry once to seed the ledger, then refreshes the caches.
    #[instrument(skip(db))]
    pub async fn load(db: DatabaseConnection) -> Result<Self> {
        let entries = get_all_entries(&db).await?;
        let ledger = CumulativeLedger::from_entries(&entries);
        save_stat_caches(&db, &ledger).await?;
        info!("Loaded {} attendance entries", entries.len());
        Ok(Self { db, ledger })
    }

    /// Read access to the connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Current cumulative statistics.
    #[must_use]
    pub const fn ledger(&self) -> &CumulativeLedger {
        &self.ledger
    }

    /// Saves one session's counts.
    ///
    /// The entry, the refreshed stat caches and the outbox document for that
    /// session commit in one transaction.
    pub async fn record_session(&mut self, submission: &SessionSubmission) -> Result<SavedEntry> {
        let txn = self.db.begin().await?;
        let mut ledger = self.ledger.clone();

        let saved = save_within(&txn, &mut ledger, submission).await?;
        save_stat_caches(&txn, &ledger).await?;

        txn.commit().await?;
        self.ledger = ledger;
        Ok(saved)
    }

    /// Saves several sessions atomically. If any of them fails, none is stored.
    pub async fn record_sessions(
        &mut self,
        submissions: &[SessionSubmission],
    ) -> Result<Vec<SavedEntry>> {
        let txn = self.db.begin().await?;
        let mut ledger = self.ledger.clone();

        let mut saved = Vec::with_capacity(submissions.len());
        for submission in submissions {
            saved.push(save_within(&txn, &mut ledger, submission).await?);
        }
        save_stat_caches(&txn, &ledger).await?;

        txn.commit().await?;
        self.ledger = ledger;
        Ok(saved)
    }

    /// Saves both sessions of a filled-in form for one class in one transaction.
    pub async fn record_form(
        &mut self,
        date: NaiveDate,
        class_id: i64,
        form: &SessionForm,
    ) -> Result<(SavedEntry, SavedEntry)> {
        let txn = self.db.begin().await?;
        let mut ledger = self.ledger.clone();

        let am = save_within(
            &txn,
            &mut ledger,
            &SessionSubmission {
                date,
                session: Session::Am,
                class_id,
                males_present: form.am.males,
                females_present: form.am.females,
            },
        )
        .await?;
        let pm = save_within(
            &txn,
            &mut ledger,
            &SessionSubmission {
                date,
                session: Session::Pm,
                class_id,
                males_present: form.pm.males,
                females_present: form.pm.females,
            },
        )
        .await?;
        save_stat_caches(&txn, &ledger).await?;

        txn.commit().await?;
        self.ledger = ledger;
        Ok((am, pm))
    }

    /// Removes one saved session. Returns whether anything was removed.
    pub async fn remove_session(
        &mut self,
        date: NaiveDate,
        session: Session,
        class_id: i64,
    ) -> Result<bool> {
        let txn = self.db.begin().await?;
        let Some(removed) = delete_entry(&txn, date, session, class_id).await? else {
            return Ok(false);
        };

        let mut ledger = self.ledger.clone();
        ledger.retract(&removed);
        save_stat_caches(&txn, &ledger).await?;

        let session_entries = get_entries_for_session(&txn, date, session).await?;
        let refs: Vec<&attendance::Model> = session_entries.iter().collect();
        enqueue_session_document(&txn, date, session, &refs).await?;

        txn.commit().await?;
        self.ledger = ledger;
        Ok(true)
    }

    /// Deletes a class and its entries.
    ///
    /// Every session that lost entries gets a fresh outbox document in the
    /// same transaction, so the remote learns about the removal.
    pub async fn delete_class(&mut self, class_id: i64) -> Result<bool> {
        let txn = self.db.begin().await?;
        let before = get_all_entries(&txn).await?;
        if !class::delete_class(&txn, class_id).await? {
            return Ok(false);
        }

        let ledger = refresh_within(&txn, &before).await?;
        txn.commit().await?;
        self.ledger = ledger;
        Ok(true)
    }

    /// Imports a bundle. Sessions the import changed are queued for sync in
    /// the same transaction.
    pub async fn import(
        &mut self,
        bundle: &ExportBundle,
        mode: ImportMode,
    ) -> Result<ImportReport> {
        let txn = self.db.begin().await?;
        let before = get_all_entries(&txn).await?;
        let report = import_bundle(&txn, bundle, mode).await?;

        let ledger = refresh_within(&txn, &before).await?;
        txn.commit().await?;
        self.ledger = ledger;
        Ok(report)
    }

    /// Recomputes the ledger and caches from every stored entry.
    pub async fn rebuild(&mut self) -> Result<()> {
        let entries = get_all_entries(&self.db).await?;
        let ledger = CumulativeLedger::from_entries(&entries);
        save_stat_caches(&self.db, &ledger).await?;
        self.ledger = ledger;
        Ok(())
    }

    /// Daily report using the current ledger.
    pub async fn daily_report(&self, date: NaiveDate) -> Result<DailyReport> {
        generate_daily_report(&self.db, date, &self.ledger).await
    }

    /// Pushes queued documents to `remote`.
    pub async fn sync<R>(&self, remote: &R, installation_id: &str) -> Result<SyncReport>
    where
        R: RemoteStore + Sync,
    {
        flush_outbox(&self.db, remote, installation_id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{
        autocopy::Gender,
        class::create_class,
        cumulative::{compute_cumulative, compute_historical_averages},
        store::{load_cumulative_cache, load_historical_average_cache},
        sync::pending,
        transfer::export_all,
    };
    use crate::errors::Error;
    use crate::test_utils::*;

    fn submission(
        class_id: i64,
        date: NaiveDate,
        session: Session,
        m: u32,
        f: u32,
    ) -> SessionSubmission {
        SessionSubmission {
            date,
            session,
            class_id,
            males_present: m,
            females_present: f,
        }
    }

    #[tokio::test]
    async fn test_record_session_updates_ledger_and_caches() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let class = create_test_class(&db, "7A").await?;
        let mut state = TrackerState::load(db).await?;

        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Am, 8, 9))
            .await?;
        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Pm, 10, 10))
            .await?;

        let stat = state.ledger().stat(class.id).unwrap();
        assert_eq!(stat.present, 37);
        assert_eq!(stat.sessions, 2);

        let cached = load_cumulative_cache(state.db()).await?;
        assert_eq!(cached[&class.id], stat);
        assert_eq!(load_historical_average_cache(state.db()).await?[&class.id], 93);

        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_keeps_ledger_equal_to_recompute() -> Result<()> {
        let db = setup_test_db().await?;
        let class = create_test_class(&db, "7A").await?;
        let mut state = TrackerState::load(db).await?;

        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Am, 8, 9))
            .await?;
        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Am, 4, 6))
            .await?;
        state
            .record_session(&submission(class.id, day(2026, 3, 3), Session::Am, 10, 10))
            .await?;

        let entries = get_all_entries(state.db()).await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(state.ledger().cumulative(), compute_cumulative(&entries));
        assert_eq!(
            state.ledger().historical_averages(),
            compute_historical_averages(&entries)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_record_session_queues_one_document_per_session() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_class(&db, "7A").await?;
        let b = create_test_class(&db, "7B").await?;
        let mut state = TrackerState::load(db).await?;

        state
            .record_session(&submission(a.id, day(2026, 3, 2), Session::Am, 8, 9))
            .await?;
        state
            .record_session(&submission(b.id, day(2026, 3, 2), Session::Am, 5, 5))
            .await?;

        let rows = pending(state.db()).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "attendance_AM_2026-03-02");
        let doc: serde_json::Value = serde_json::from_str(&rows[0].payload)?;
        assert_eq!(doc["entries"].as_array().unwrap().len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_local_save() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let class = create_test_class(&db, "7A").await?;
        let mut state = TrackerState::load(db).await?;

        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Am, 8, 9))
            .await?;
        let report = state.sync(&MemoryRemote::failing(), "school-1").await?;

        assert_eq!(report.failed, 1);
        assert_eq!(get_all_entries(state.db()).await?.len(), 1);
        assert_eq!(pending(state.db()).await?.len(), 1);

        let remote = MemoryRemote::default();
        let report = state.sync(&remote, "school-1").await?;
        assert_eq!(report.synced, 1);
        assert!(pending(state.db()).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_record_form_saves_carried_pm() -> Result<()> {
        let db = setup_test_db().await?;
        let class = create_test_class(&db, "7A").await?;
        let mut state = TrackerState::load(db).await?;

        let mut form = SessionForm::new(class.male, class.female);
        form.set_am(Gender::Male, 9);
        form.set_am(Gender::Female, 8);
        form.set_pm(Gender::Female, 7);

        let (am, pm) = state.record_form(day(2026, 3, 2), class.id, &form).await?;
        assert_eq!((am.entry.males_present, am.entry.females_present), (9, 8));
        assert_eq!((pm.entry.males_present, pm.entry.females_present), (9, 7));
        assert_eq!(state.ledger().stat(class.id).unwrap().sessions, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_session_and_delete_class() -> Result<()> {
        let db = setup_test_db().await?;
        let class = create_test_class(&db, "7A").await?;
        let mut state = TrackerState::load(db).await?;

        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Am, 8, 9))
            .await?;
        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Pm, 8, 9))
            .await?;

        assert!(state.remove_session(day(2026, 3, 2), Session::Pm, class.id).await?);
        assert!(!state.remove_session(day(2026, 3, 2), Session::Pm, class.id).await?);
        assert_eq!(state.ledger().stat(class.id).unwrap().sessions, 1);

        assert!(state.delete_class(class.id).await?);
        assert!(state.ledger().stat(class.id).is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_import_rebuilds_ledger() -> Result<()> {
        let source = setup_test_db().await?;
        let class = create_test_class(&source, "7A").await?;
        save_test_entry(&source, class.id, day(2026, 3, 2), Session::Am, 8, 9).await?;
        let bundle = export_all(&source).await?;

        let mut state = TrackerState::load(setup_test_db().await?).await?;
        state.import(&bundle, ImportMode::Merge).await?;

        let report = state.daily_report(day(2026, 3, 2)).await?;
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].historical_average, 85);

        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_on_half_boundary_matches_recompute() -> Result<()> {
        let db = setup_test_db().await?;
        let class = create_class(&db, "7A", "Year 7", 10, 12).await?;
        let mut state = TrackerState::load(db).await?;

        for (dayofmonth, m, f) in [(2, 8, 11), (3, 10, 9), (4, 8, 4), (5, 8, 7)] {
            state
                .record_session(&submission(class.id, day(2026, 3, dayofmonth), Session::Am, m, f))
                .await?;
        }
        state
            .record_session(&submission(class.id, day(2026, 3, 2), Session::Am, 3, 6))
            .await?;

        // Rates now sum to exactly 250 over four entries
        let entries = get_all_entries(state.db()).await?;
        assert_eq!(compute_historical_averages(&entries)[&class.id], 63);
        assert_eq!(state.ledger().historical_average(class.id), 63);
        assert_eq!(load_historical_average_cache(state.db()).await?[&class.id], 63);

        let report = state.daily_report(day(2026, 3, 5)).await?;
        assert_eq!(report.rows[0].historical_average, 63);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_sessions_is_all_or_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let class = create_test_class(&db, "7A").await?;
        let mut state = TrackerState::load(db).await?;

        let result = state
            .record_sessions(&[
                submission(class.id, day(2026, 3, 2), Session::Am, 8, 9),
                submission(404, day(2026, 3, 2), Session::Pm, 8, 9),
            ])
            .await;
        assert!(matches!(result, Err(Error::ClassNotFound { .. })));

        assert!(get_all_entries(state.db()).await?.is_empty());
        assert!(pending(state.db()).await?.is_empty());
        assert!(state.ledger().stat(class.id).is_none());
        assert!(load_cumulative_cache(state.db()).await?.is_empty());

        let saved = state
            .record_sessions(&[
                submission(class.id, day(2026, 3, 2), Session::Am, 8, 9),
                submission(class.id, day(2026, 3, 2), Session::Pm, 10, 10),
            ])
            .await?;
        assert_eq!(saved.len(), 2);
        assert_eq!(state.ledger().stat(class.id).unwrap().sessions, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_class_queues_emptied_sessions() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_class(&db, "7A").await?;
        let b = create_test_class(&db, "7B").await?;
        let mut state = TrackerState::load(db).await?;

        state
            .record_session(&submission(a.id, day(2026, 3, 2), Session::Am, 8, 9))
            .await?;
        state
            .record_session(&submission(a.id, day(2026, 3, 3), Session::Pm, 8, 9))
            .await?;
        state
            .record_session(&submission(b.id, day(2026, 3, 3), Session::Pm, 5, 5))
            .await?;
        state.sync(&MemoryRemote::default(), "school-1").await?;
        assert!(pending(state.db()).await?.is_empty());

        assert!(state.delete_class(a.id).await?);

        let rows = pending(state.db()).await?;
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["attendance_AM_2026-03-02", "attendance_PM_2026-03-03"]);

        let emptied: serde_json::Value = serde_json::from_str(&rows[0].payload)?;
        assert!(emptied["entries"].as_array().unwrap().is_empty());
        let remaining: serde_json::Value = serde_json::from_str(&rows[1].payload)?;
        assert_eq!(remaining["entries"].as_array().unwrap().len(), 1);
        assert_eq!(remaining["entries"][0]["class_id"], b.id);

        // Unknown class changes nothing
        assert!(!state.delete_class(a.id).await?);
        assert_eq!(pending(state.db()).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_import_queues_changed_sessions() -> Result<()> {
        let source = setup_test_db().await?;
        let class = create_test_class(&source, "7A").await?;
        save_test_entry(&source, class.id, day(2026, 3, 2), Session::Am, 8, 9).await?;
        save_test_entry(&source, class.id, day(2026, 3, 2), Session::Pm, 10, 10).await?;
        let bundle = export_all(&source).await?;

        let mut state = TrackerState::load(setup_test_db().await?).await?;
        state.import(&bundle, ImportMode::Merge).await?;
        assert_eq!(pending(state.db()).await?.len(), 2);
        assert_eq!(
            *state.ledger(),
            CumulativeLedger::from_entries(&get_all_entries(state.db()).await?)
        );

        // Importing the same data again changes no session
        state.sync(&MemoryRemote::default(), "school-1").await?;
        state.import(&bundle, ImportMode::Merge).await?;
        assert!(pending(state.db()).await?.is_empty());

        Ok(())
    }
}
