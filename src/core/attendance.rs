//! Attendance business logic - Saving and retrieving session counts.
//!
//! A submission is clamped to the class roster, labelled with the active term
//! and written over any entry with the same date, session and class. The
//! class's gender totals are copied onto the entry at save time.

use crate::{
    core::{class::get_class_by_id, term::get_active_term},
    entities::{Attendance, Session, attendance, class},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Counts entered for one class and session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSubmission {
    /// School day
    pub date: NaiveDate,
    /// AM or PM
    pub session: Session,
    /// Class the counts belong to
    pub class_id: i64,
    /// Male students present as entered
    pub males_present: u32,
    /// Female students present as entered
    pub females_present: u32,
}

/// Outcome of saving a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedEntry {
    /// Entry as stored
    pub entry: attendance::Model,
    /// Entry that was overwritten, if the triple had been saved before
    pub previous: Option<attendance::Model>,
    /// Whether any count was lowered to fit the roster
    pub clamped: bool,
}

/// Limits present counts to the class roster. Returns the clamped counts and
/// whether either had to change.
#[must_use]
pub fn clamp_counts(class: &class::Model, males_present: u32, females_present: u32) -> (u32, u32, bool) {
    let males = males_present.min(class.male);
    let females = females_present.min(class.female);
    (
        males,
        females,
        males != males_present || females != females_present,
    )
}

/// Entry saved for one date, session and class.
pub async fn get_entry<C>(
    db: &C,
    date: NaiveDate,
    session: Session,
    class_id: i64,
) -> Result<Option<attendance::Model>>
where
    C: ConnectionTrait,
{
    Attendance::find()
        .filter(attendance::Column::Date.eq(date))
        .filter(attendance::Column::Session.eq(session))
        .filter(attendance::Column::ClassId.eq(class_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Every entry, oldest date first.
pub async fn get_all_entries<C>(db: &C) -> Result<Vec<attendance::Model>>
where
    C: ConnectionTrait,
{
    Attendance::find()
        .order_by_asc(attendance::Column::Date)
        .order_by_asc(attendance::Column::Session)
        .order_by_asc(attendance::Column::ClassId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every entry saved for `date`, both sessions.
pub async fn get_entries_for_date<C>(db: &C, date: NaiveDate) -> Result<Vec<attendance::Model>>
where
    C: ConnectionTrait,
{
    Attendance::find()
        .filter(attendance::Column::Date.eq(date))
        .order_by_asc(attendance::Column::Session)
        .order_by_asc(attendance::Column::ClassId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every entry saved for one session of `date`.
pub async fn get_entries_for_session<C>(
    db: &C,
    date: NaiveDate,
    session: Session,
) -> Result<Vec<attendance::Model>>
where
    C: ConnectionTrait,
{
    Attendance::find()
        .filter(attendance::Column::Date.eq(date))
        .filter(attendance::Column::Session.eq(session))
        .order_by_asc(attendance::Column::ClassId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Clamps and stores a submission, overwriting an earlier save of the same
/// date, session and class.
///
/// Counts above the class roster are lowered to it and the entry takes its
/// roster snapshot and active term from the current data. Run it inside a
/// transaction when other writes have to commit together with the entry.
///
/// # Arguments
/// * `db` - Connection or open transaction to write through
/// * `submission` - Date, session, class and the present counts
///
/// # Returns
/// The stored entry, whether the counts were clamped, and the entry it
/// replaced. Fails with `ClassNotFound` when the class does not exist.
pub async fn save_session<C>(db: &C, submission: &SessionSubmission) -> Result<SavedEntry>
where
    C: ConnectionTrait,
{
    let class = get_class_by_id(db, submission.class_id)
        .await?
        .ok_or_else(|| Error::ClassNotFound {
            id: submission.class_id.to_string(),
        })?;

    let (males_present, females_present, clamped) =
        clamp_counts(&class, submission.males_present, submission.females_present);
    if clamped {
        warn!(
            "Clamped {} {} counts for class {} from {}/{} to {}/{}",
            submission.date,
            submission.session,
            class.code,
            submission.males_present,
            submission.females_present,
            males_present,
            females_present
        );
    }

    let term_id = get_active_term(db).await?.map(|t| t.id);
    let now = Utc::now().naive_utc();
    let previous = get_entry(db, submission.date, submission.session, class.id).await?;

    let entry = if let Some(existing) = previous.clone() {
        let mut active: attendance::ActiveModel = existing.into();
        active.males_present = Set(males_present);
        active.females_present = Set(females_present);
        active.total_males = Set(class.male);
        active.total_females = Set(class.female);
        active.term_id = Set(term_id);
        active.updated_at = Set(now);
        active.update(db).await?
    } else {
        attendance::ActiveModel {
            date: Set(submission.date),
            session: Set(submission.session),
            class_id: Set(class.id),
            males_present: Set(males_present),
            females_present: Set(females_present),
            total_males: Set(class.male),
            total_females: Set(class.female),
            term_id: Set(term_id),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?
    };

    debug!(
        "Saved {} {} for class {}: {} present of {}",
        entry.date,
        entry.session,
        class.code,
        males_present + females_present,
        class.class_size()
    );

    Ok(SavedEntry {
        entry,
        previous,
        clamped,
    })
}

/// Deletes the entry for one date, session and class. Returns the removed entry.
pub async fn delete_entry<C>(
    db: &C,
    date: NaiveDate,
    session: Session,
    class_id: i64,
) -> Result<Option<attendance::Model>>
where
    C: ConnectionTrait,
{
    let Some(existing) = get_entry(db, date, session, class_id).await? else {
        return Ok(None);
    };
    Attendance::delete_by_id(existing.id).exec(db).await?;
    Ok(Some(existing))
}
