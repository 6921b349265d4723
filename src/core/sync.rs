//! Remote sync business logic.
//!
//! Saving is two-phase. The local write and an outbox row commit together,
//! and a later [`flush_outbox`] pushes queued documents to a [`RemoteStore`].
//! Remote failures stay on the outbox row and are reported in the
//! [`SyncReport`]; they never undo or fail the local save.

use crate::{
    entities::{SyncOutbox, sync_outbox},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Destination for synced documents.
pub trait RemoteStore {
    /// Stores `payload` under `key` for one installation, replacing any earlier copy.
    fn put(
        &self,
        installation_id: &str,
        key: &str,
        payload: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Remote store backed by a directory tree: `<root>/<installation>/<key>.json`.
///
/// Suitable for a mounted network share or a folder another tool uploads.
#[derive(Debug, Clone)]
pub struct DirectoryRemote {
    root: PathBuf,
}

impl DirectoryRemote {
    /// Remote rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this remote.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a document lands in.
    #[must_use]
    pub fn document_path(&self, installation_id: &str, key: &str) -> PathBuf {
        self.root
            .join(sanitize(installation_id))
            .join(format!("{}.json", sanitize(key)))
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl RemoteStore for DirectoryRemote {
    fn put(
        &self,
        installation_id: &str,
        key: &str,
        payload: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        let path = self.document_path(installation_id, key);
        let payload = payload.to_string();
        async move {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, payload).await?;
            debug!("Wrote remote document {}", path.display());
            Ok(())
        }
    }
}

/// Remote store for installations without sync configured. Every write fails,
/// so documents stay queued until a real remote is set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRemote;

impl RemoteStore for DisabledRemote {
    fn put(
        &self,
        _installation_id: &str,
        key: &str,
        _payload: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(Err(Error::Remote {
            message: format!("remote sync is not configured, {key} stays queued"),
        }))
    }
}

/// Result of one flush of the outbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Documents pushed and removed from the outbox
    pub synced: usize,
    /// Documents that stayed queued after a failed push
    pub failed: usize,
    /// Message of the last failure in this flush
    pub last_error: Option<String>,
}

impl SyncReport {
    /// Short notice for the person who saved.
    #[must_use]
    pub fn notice(&self) -> String {
        if self.failed == 0 {
            if self.synced == 0 {
                "Saved. Nothing waiting to sync.".to_string()
            } else {
                format!("Saved and synced {} document(s).", self.synced)
            }
        } else {
            format!(
                "Saved locally. {} document(s) will sync later.",
                self.failed
            )
        }
    }
}

/// Queues `payload` for `key`. A document already waiting under the same key
/// is replaced, so only the latest version is pushed.
pub async fn enqueue<C>(db: &C, key: &str, payload: &str) -> Result<sync_outbox::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();
    let existing = SyncOutbox::find()
        .filter(sync_outbox::Column::Key.eq(key))
        .one(db)
        .await?;

    let row = if let Some(row) = existing {
        let mut active: sync_outbox::ActiveModel = row.into();
        active.payload = Set(payload.to_string());
        active.created_at = Set(now);
        active.update(db).await?
    } else {
        sync_outbox::ActiveModel {
            key: Set(key.to_string()),
            payload: Set(payload.to_string()),
            attempts: Set(0),
            last_error: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?
    };
    debug!("Queued {key} for remote sync");
    Ok(row)
}

/// Documents waiting to be pushed, oldest first.
pub async fn pending<C>(db: &C) -> Result<Vec<sync_outbox::Model>>
where
    C: ConnectionTrait,
{
    SyncOutbox::find()
        .order_by_asc(sync_outbox::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Pushes every queued document once.
///
/// Pushed documents leave the outbox. A failed push bumps the row's attempt
/// count and records the message, then the flush carries on with the next
/// document. The local save never depends on the remote being reachable.
///
/// # Arguments
/// * `db` - Database holding the outbox
/// * `remote` - Store the documents are written to
/// * `installation_id` - Namespace for this installation's documents
///
/// # Returns
/// Counts of synced and failed documents plus the last remote error. Only
/// local database errors are returned as `Err`.
#[instrument(skip(db, remote))]
pub async fn flush_outbox<R>(
    db: &DatabaseConnection,
    remote: &R,
    installation_id: &str,
) -> Result<SyncReport>
where
    R: RemoteStore + Sync,
{
    if installation_id.trim().is_empty() {
        return Err(Error::Config {
            message: "Remote sync needs an installation id".to_string(),
        });
    }

    let mut report = SyncReport::default();
    for row in pending(db).await? {
        match remote.put(installation_id, &row.key, &row.payload).await {
            Ok(()) => {
                SyncOutbox::delete_by_id(row.id).exec(db).await?;
                report.synced += 1;
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Remote sync of {} failed, keeping it queued: {message}", row.key);
                let attempts = row.attempts + 1;
                let mut active: sync_outbox::ActiveModel = row.into();
                active.attempts = Set(attempts);
                active.last_error = Set(Some(message.clone()));
                active.update(db).await?;
                report.failed += 1;
                report.last_error = Some(message);
            }
        }
    }

    info!(
        "Remote sync finished: {} synced, {} still queued",
        report.synced, report.failed
    );
    Ok(report)
}
