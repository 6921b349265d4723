//! Term business logic - Creating terms and switching the active term.
//!
//! At most one term is active at a time. New attendance entries are labelled
//! with the active term, but terms never restrict which dates can be recorded.

use crate::{
    config::TermConfig,
    entities::{Term, term},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// Retrieves every term ordered by start date.
pub async fn get_all_terms<C>(db: &C) -> Result<Vec<term::Model>>
where
    C: ConnectionTrait,
{
    Term::find()
        .order_by_asc(term::Column::StartDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a term by its unique ID.
pub async fn get_term_by_id<C>(db: &C, term_id: i64) -> Result<Option<term::Model>>
where
    C: ConnectionTrait,
{
    Term::find_by_id(term_id).one(db).await.map_err(Into::into)
}

/// The currently active term, if any.
pub async fn get_active_term<C>(db: &C) -> Result<Option<term::Model>>
where
    C: ConnectionTrait,
{
    Term::find()
        .filter(term::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// The term whose dates contain `date`, preferring the earliest start.
pub async fn get_term_for_date<C>(db: &C, date: NaiveDate) -> Result<Option<term::Model>>
where
    C: ConnectionTrait,
{
    Term::find()
        .filter(term::Column::StartDate.lte(date))
        .filter(term::Column::EndDate.gte(date))
        .order_by_asc(term::Column::StartDate)
        .one(db)
        .await
        .map_err(Into::into)
}

pub(crate) fn validate_term(
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    weeks: u32,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("Term name cannot be empty"));
    }
    if end_date < start_date {
        return Err(Error::validation(format!(
            "Term end {end_date} is before its start {start_date}"
        )));
    }
    if weeks == 0 {
        return Err(Error::validation("A term needs at least one week"));
    }
    Ok(())
}

/// Creates a term. When `active` is set, every other term is deactivated in
/// the same transaction.
pub async fn create_term(
    db: &DatabaseConnection,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    weeks: u32,
    active: bool,
) -> Result<term::Model> {
    validate_term(name, start_date, end_date, weeks)?;

    let txn = db.begin().await?;
    if active {
        deactivate_all(&txn).await?;
    }

    let model = term::ActiveModel {
        name: Set(name.trim().to_string()),
        start_date: Set(start_date),
        end_date: Set(end_date),
        weeks: Set(weeks),
        is_active: Set(active),
        ..Default::default()
    };
    let created = model.insert(&txn).await?;
    txn.commit().await?;

    info!("Created term {} ({} - {})", created.name, start_date, end_date);
    Ok(created)
}

async fn deactivate_all<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    Term::update_many()
        .col_expr(term::Column::IsActive, Expr::value(false))
        .filter(term::Column::IsActive.eq(true))
        .exec(db)
        .await?;
    Ok(())
}

/// Makes `term_id` the only active term.
pub async fn set_active_term(db: &DatabaseConnection, term_id: i64) -> Result<term::Model> {
    let txn = db.begin().await?;

    let existing = get_term_by_id(&txn, term_id)
        .await?
        .ok_or_else(|| Error::TermNotFound {
            id: term_id.to_string(),
        })?;

    deactivate_all(&txn).await?;
    let mut active: term::ActiveModel = existing.into();
    active.is_active = Set(true);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!("Active term is now {}", updated.name);
    Ok(updated)
}

/// Inserts configured terms whose name is not taken yet. Returns how many were added.
pub async fn seed_terms(db: &DatabaseConnection, terms: &[TermConfig]) -> Result<usize> {
    let mut added = 0;
    for config in terms {
        let exists = Term::find()
            .filter(term::Column::Name.eq(config.name.trim()))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }
        create_term(
            db,
            &config.name,
            config.start_date,
            config.end_date,
            config.weeks,
            config.active,
        )
        .await?;
        added += 1;
    }
    Ok(added)
}
