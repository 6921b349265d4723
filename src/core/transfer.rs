//! Whole-state export and import.
//!
//! An export is a JSON [`ExportBundle`] whose `data` object holds every
//! class, attendance entry and term. Importing reconciles a bundle with the
//! local data by natural key:
//!
//! - classes by code and year group
//! - entries by date, session and class (the class resolved through its natural key)
//! - terms by id
//!
//! The whole import runs in one transaction.

use crate::{
    core::{
        attendance::{get_all_entries, get_entry},
        class::{create_class, get_all_classes, get_class_by_code},
        term::{get_all_terms, validate_term},
    },
    entities::{Attendance, Class, Term, attendance, class, term},
    errors::{Error, Result},
};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Bundle format version written by this build.
pub const EXPORT_VERSION: u32 = 1;

/// Everything an export contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    /// Format version
    pub version: u32,
    /// When the export was taken (UTC)
    pub exported_at: NaiveDateTime,
    /// The exported collections
    pub data: ExportData,
}

/// Entity collections of an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportData {
    /// All classes
    #[serde(default)]
    pub classes: Vec<class::Model>,
    /// All attendance entries
    #[serde(default)]
    pub attendance: Vec<attendance::Model>,
    /// All terms
    #[serde(default)]
    pub terms: Vec<term::Model>,
}

/// How an import treats data that already exists locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Update matching records and add new ones
    #[default]
    Merge,
    /// Delete all local data first, then load the bundle
    Replace,
    /// Add new records only; matching records keep their local values
    AddOnly,
}

impl FromStr for ImportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "replace" => Ok(Self::Replace),
            "add-only" | "add_only" | "addonly" => Ok(Self::AddOnly),
            other => Err(Error::validation(format!(
                "Unknown import mode '{other}', expected merge, replace or add-only"
            ))),
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
            Self::AddOnly => "add-only",
        })
    }
}

/// Counts of what an import changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Classes inserted
    pub classes_added: usize,
    /// Existing classes whose roster was updated
    pub classes_updated: usize,
    /// Terms inserted
    pub terms_added: usize,
    /// Existing terms updated
    pub terms_updated: usize,
    /// Entries inserted
    pub entries_added: usize,
    /// Existing entries overwritten
    pub entries_updated: usize,
    /// Entries left out (unknown class, or already present in add-only mode)
    pub entries_skipped: usize,
}

/// Collects every class, entry and term into a bundle.
pub async fn export_all(db: &DatabaseConnection) -> Result<ExportBundle> {
    let data = ExportData {
        classes: get_all_classes(db).await?,
        attendance: get_all_entries(db).await?,
        terms: get_all_terms(db).await?,
    };
    info!(
        "Exported {} classes, {} entries, {} terms",
        data.classes.len(),
        data.attendance.len(),
        data.terms.len()
    );
    Ok(ExportBundle {
        version: EXPORT_VERSION,
        exported_at: Utc::now().naive_utc(),
        data,
    })
}

/// Pretty-printed JSON for a bundle.
pub fn to_json(bundle: &ExportBundle) -> Result<String> {
    serde_json::to_string_pretty(bundle).map_err(Into::into)
}

/// Parses a bundle, refusing versions newer than this build understands.
pub fn parse_bundle(json: &str) -> Result<ExportBundle> {
    let bundle: ExportBundle = serde_json::from_str(json)?;
    if bundle.version > EXPORT_VERSION {
        return Err(Error::validation(format!(
            "Export version {} is newer than supported version {EXPORT_VERSION}",
            bundle.version
        )));
    }
    Ok(bundle)
}

async fn import_terms<C>(
    db: &C,
    terms: &[term::Model],
    mode: ImportMode,
    report: &mut ImportReport,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut activated = None;

    for incoming in terms {
        validate_term(&incoming.name, incoming.start_date, incoming.end_date, incoming.weeks)?;

        match Term::find_by_id(incoming.id).one(db).await? {
            Some(existing) => {
                if mode == ImportMode::AddOnly {
                    continue;
                }
                let mut active: term::ActiveModel = existing.into();
                active.name = Set(incoming.name.clone());
                active.start_date = Set(incoming.start_date);
                active.end_date = Set(incoming.end_date);
                active.weeks = Set(incoming.weeks);
                active.is_active = Set(false);
                active.update(db).await?;
                report.terms_updated += 1;
            }
            None => {
                term::ActiveModel {
                    id: Set(incoming.id),
                    name: Set(incoming.name.clone()),
                    start_date: Set(incoming.start_date),
                    end_date: Set(incoming.end_date),
                    weeks: Set(incoming.weeks),
                    is_active: Set(false),
                }
                .insert(db)
                .await?;
                report.terms_added += 1;
            }
        }

        if incoming.is_active {
            activated = Some(incoming.id);
        }
    }

    // A bundle's active term only takes over when the import may change existing state
    let has_active = Term::find()
        .filter(term::Column::IsActive.eq(true))
        .one(db)
        .await?
        .is_some();
    if let Some(id) = activated {
        if mode != ImportMode::AddOnly || !has_active {
            Term::update_many()
                .col_expr(term::Column::IsActive, Expr::value(false))
                .exec(db)
                .await?;
            Term::update_many()
                .col_expr(term::Column::IsActive, Expr::value(true))
                .filter(term::Column::Id.eq(id))
                .exec(db)
                .await?;
        }
    }
    Ok(())
}

/// Imports classes and returns a map from bundle class id to local class id.
async fn import_classes<C>(
    db: &C,
    classes: &[class::Model],
    mode: ImportMode,
    report: &mut ImportReport,
) -> Result<HashMap<i64, i64>>
where
    C: ConnectionTrait,
{
    let mut id_map = HashMap::new();

    for incoming in classes {
        let local = match get_class_by_code(db, &incoming.code, &incoming.year_group).await? {
            Some(existing) => {
                let unchanged =
                    existing.male == incoming.male && existing.female == incoming.female;
                if mode == ImportMode::AddOnly || unchanged {
                    existing
                } else {
                    let mut active: class::ActiveModel = existing.into();
                    active.male = Set(incoming.male);
                    active.female = Set(incoming.female);
                    active.total = Set(incoming.male + incoming.female);
                    report.classes_updated += 1;
                    active.update(db).await?
                }
            }
            None => {
                report.classes_added += 1;
                create_class(
                    db,
                    &incoming.code,
                    &incoming.year_group,
                    incoming.male,
                    incoming.female,
                )
                .await?
            }
        };
        id_map.insert(incoming.id, local.id);
    }

    Ok(id_map)
}

async fn import_entries<C>(
    db: &C,
    entries: &[attendance::Model],
    class_ids: &HashMap<i64, i64>,
    mode: ImportMode,
    report: &mut ImportReport,
) -> Result<()>
where
    C: ConnectionTrait,
{
    for incoming in entries {
        let Some(&class_id) = class_ids.get(&incoming.class_id) else {
            warn!(
                "Skipping {} {} entry for unknown class id {}",
                incoming.date, incoming.session, incoming.class_id
            );
            report.entries_skipped += 1;
            continue;
        };

        let term_id = match incoming.term_id {
            Some(id) => Term::find_by_id(id).one(db).await?.map(|t| t.id),
            None => None,
        };
        let males_present = incoming.males_present.min(incoming.total_males);
        let females_present = incoming.females_present.min(incoming.total_females);

        match get_entry(db, incoming.date, incoming.session, class_id).await? {
            Some(existing) => {
                if mode == ImportMode::AddOnly {
                    report.entries_skipped += 1;
                    continue;
                }
                let mut active: attendance::ActiveModel = existing.into();
                active.males_present = Set(males_present);
                active.females_present = Set(females_present);
                active.total_males = Set(incoming.total_males);
                active.total_females = Set(incoming.total_females);
                active.term_id = Set(term_id);
                active.updated_at = Set(incoming.updated_at);
                active.update(db).await?;
                report.entries_updated += 1;
            }
            None => {
                attendance::ActiveModel {
                    date: Set(incoming.date),
                    session: Set(incoming.session),
                    class_id: Set(class_id),
                    males_present: Set(males_present),
                    females_present: Set(females_present),
                    total_males: Set(incoming.total_males),
                    total_females: Set(incoming.total_females),
                    term_id: Set(term_id),
                    updated_at: Set(incoming.updated_at),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                report.entries_added += 1;
            }
        }
    }
    Ok(())
}

/// Reconciles `bundle` with the local data according to `mode`.
///
/// This function is used when restoring a backup or moving data between
/// installations. Terms are applied first, then classes (matched by code and
/// year group), then entries, which are re-pointed at the local class ids.
/// Everything runs in one transaction, nested as a savepoint when `db` is
/// already a transaction, so a failed import leaves the local data untouched.
///
/// # Arguments
/// * `db` - Database connection or open transaction
/// * `bundle` - Parsed export, see [`parse_bundle`]
/// * `mode` - Merge, replace or add-only reconciliation
///
/// # Returns
/// An [`ImportReport`] counting added, updated and skipped records
#[instrument(skip(db, bundle))]
pub async fn import_bundle<C>(
    db: &C,
    bundle: &ExportBundle,
    mode: ImportMode,
) -> Result<ImportReport>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let mut report = ImportReport::default();

    if mode == ImportMode::Replace {
        Attendance::delete_many().exec(&txn).await?;
        Class::delete_many().exec(&txn).await?;
        Term::delete_many().exec(&txn).await?;
        info!("Cleared local data before replace import");
    }

    import_terms(&txn, &bundle.data.terms, mode, &mut report).await?;
    let class_ids = import_classes(&txn, &bundle.data.classes, mode, &mut report).await?;
    import_entries(&txn, &bundle.data.attendance, &class_ids, mode, &mut report).await?;

    txn.commit().await?;
    info!("Import ({mode}) finished: {report:?}");
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::term::{create_term, get_active_term};
    use crate::entities::Session;
    use crate::test_utils::*;

    async fn populated_bundle() -> Result<ExportBundle> {
        let db = setup_test_db().await?;
        let a = create_test_class(&db, "7A").await?;
        let b = create_test_class(&db, "7B").await?;
        create_term(&db, "Term 1", day(2026, 1, 5), day(2026, 3, 27), 12, true).await?;
        save_test_entry(&db, a.id, day(2026, 3, 2), Session::Am, 8, 9).await?;
        save_test_entry(&db, a.id, day(2026, 3, 2), Session::Pm, 10, 10).await?;
        save_test_entry(&db, b.id, day(2026, 3, 2), Session::Am, 5, 6).await?;
        export_all(&db).await
    }

    #[test]
    fn test_import_mode_parsing() {
        assert_eq!("merge".parse::<ImportMode>().unwrap(), ImportMode::Merge);
        assert_eq!("Replace".parse::<ImportMode>().unwrap(), ImportMode::Replace);
        assert_eq!("add-only".parse::<ImportMode>().unwrap(), ImportMode::AddOnly);
        assert!("overwrite".parse::<ImportMode>().is_err());
        assert_eq!(ImportMode::AddOnly.to_string(), "add-only");
    }

    #[tokio::test]
    async fn test_export_json_has_data_object() -> Result<()> {
        let bundle = populated_bundle().await?;
        let json = to_json(&bundle)?;
        let value: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(value["data"]["classes"].as_array().unwrap().len(), 2);
        assert_eq!(value["data"]["attendance"].as_array().unwrap().len(), 3);
        assert_eq!(value["data"]["attendance"][0]["session"], "AM");
        assert_eq!(value["data"]["terms"].as_array().unwrap().len(), 1);

        let parsed = parse_bundle(&json)?;
        assert_eq!(parsed, bundle);
        Ok(())
    }

    #[test]
    fn test_parse_bundle_rejects_newer_version() {
        let json = r#"{"version": 99, "exported_at": "2026-03-02T08:00:00", "data": {}}"#;
        assert!(matches!(parse_bundle(json), Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_import_into_empty_database() -> Result<()> {
        let bundle = populated_bundle().await?;
        let db = setup_test_db().await?;

        let report = import_bundle(&db, &bundle, ImportMode::Merge).await?;
        assert_eq!(report.classes_added, 2);
        assert_eq!(report.entries_added, 3);
        assert_eq!(report.terms_added, 1);

        assert_eq!(get_all_entries(&db).await?.len(), 3);
        assert!(get_active_term(&db).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_updates_existing_by_natural_key() -> Result<()> {
        let bundle = populated_bundle().await?;
        let db = setup_test_db().await?;

        // Local 7A has a different id and counts for the same triple
        create_test_class(&db, "Z9").await?;
        let local = create_test_class(&db, "7A").await?;
        save_test_entry(&db, local.id, day(2026, 3, 2), Session::Am, 1, 1).await?;

        let report = import_bundle(&db, &bundle, ImportMode::Merge).await?;
        assert_eq!(report.classes_added, 1);
        assert_eq!(report.entries_updated, 1);
        assert_eq!(report.entries_added, 2);

        let entry = get_entry(&db, day(2026, 3, 2), Session::Am, local.id)
            .await?
            .unwrap();
        assert_eq!((entry.males_present, entry.females_present), (8, 9));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_only_keeps_local_values() -> Result<()> {
        let bundle = populated_bundle().await?;
        let db = setup_test_db().await?;
        let local = create_test_class(&db, "7A").await?;
        save_test_entry(&db, local.id, day(2026, 3, 2), Session::Am, 1, 1).await?;

        let report = import_bundle(&db, &bundle, ImportMode::AddOnly).await?;
        assert_eq!(report.entries_skipped, 1);
        assert_eq!(report.entries_added, 2);

        let entry = get_entry(&db, day(2026, 3, 2), Session::Am, local.id)
            .await?
            .unwrap();
        assert_eq!((entry.males_present, entry.females_present), (1, 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_discards_local_data() -> Result<()> {
        let bundle = populated_bundle().await?;
        let db = setup_test_db().await?;
        let extra = create_test_class(&db, "Z9").await?;
        save_test_entry(&db, extra.id, day(2026, 2, 2), Session::Am, 3, 3).await?;

        import_bundle(&db, &bundle, ImportMode::Replace).await?;

        let classes = get_all_classes(&db).await?;
        assert_eq!(classes.len(), 2);
        assert!(classes.iter().all(|c| c.code != "Z9"));
        assert_eq!(get_all_entries(&db).await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_entries_for_unknown_class_are_skipped() -> Result<()> {
        let mut bundle = populated_bundle().await?;
        bundle.data.classes.retain(|c| c.code == "7A");

        let db = setup_test_db().await?;
        let report = import_bundle(&db, &bundle, ImportMode::Merge).await?;
        assert_eq!(report.entries_added, 2);
        assert_eq!(report.entries_skipped, 1);
        Ok(())
    }
}
