//! Class business logic - Handles setup and maintenance of classes.
//!
//! Classes are identified to users by code and year group, and that pair is
//! unique. The stored total is recomputed from the gender counts on every write.

use crate::{
    config::ClassConfig,
    entities::{Attendance, Class, attendance, class},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Retrieves every class, ordered by year group and then code.
pub async fn get_all_classes<C>(db: &C) -> Result<Vec<class::Model>>
where
    C: ConnectionTrait,
{
    Class::find()
        .order_by_asc(class::Column::YearGroup)
        .order_by_asc(class::Column::Code)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a class by its unique ID.
pub async fn get_class_by_id<C>(db: &C, class_id: i64) -> Result<Option<class::Model>>
where
    C: ConnectionTrait,
{
    Class::find_by_id(class_id).one(db).await.map_err(Into::into)
}

/// Finds a class by its natural key, code plus year group.
pub async fn get_class_by_code<C>(
    db: &C,
    code: &str,
    year_group: &str,
) -> Result<Option<class::Model>>
where
    C: ConnectionTrait,
{
    Class::find()
        .filter(class::Column::Code.eq(code.trim()))
        .filter(class::Column::YearGroup.eq(year_group.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

fn validate_labels(code: &str, year_group: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(Error::validation("Class code cannot be empty"));
    }
    if year_group.trim().is_empty() {
        return Err(Error::validation("Year group cannot be empty"));
    }
    Ok(())
}

/// Creates a class after validating its labels and checking the natural key is free.
pub async fn create_class<C>(
    db: &C,
    code: &str,
    year_group: &str,
    male: u32,
    female: u32,
) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    validate_labels(code, year_group)?;

    if get_class_by_code(db, code, year_group).await?.is_some() {
        return Err(Error::DuplicateClass {
            code: code.trim().to_string(),
            year_group: year_group.trim().to_string(),
        });
    }

    let model = class::ActiveModel {
        code: Set(code.trim().to_string()),
        year_group: Set(year_group.trim().to_string()),
        total: Set(male + female),
        male: Set(male),
        female: Set(female),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    info!(
        "Created class {} ({}) with {} students",
        created.code, created.year_group, created.total
    );
    Ok(created)
}

/// Updates a class's labels and roster. Existing attendance entries keep the
/// roster they were saved with.
pub async fn update_class<C>(
    db: &C,
    class_id: i64,
    code: &str,
    year_group: &str,
    male: u32,
    female: u32,
) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    validate_labels(code, year_group)?;

    let existing = get_class_by_id(db, class_id)
        .await?
        .ok_or_else(|| Error::ClassNotFound {
            id: class_id.to_string(),
        })?;

    if let Some(other) = get_class_by_code(db, code, year_group).await? {
        if other.id != class_id {
            return Err(Error::DuplicateClass {
                code: code.trim().to_string(),
                year_group: year_group.trim().to_string(),
            });
        }
    }

    let mut active: class::ActiveModel = existing.into();
    active.code = Set(code.trim().to_string());
    active.year_group = Set(year_group.trim().to_string());
    active.male = Set(male);
    active.female = Set(female);
    active.total = Set(male + female);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a class together with all of its attendance entries.
///
/// Both deletes run in one transaction, nested as a savepoint when `db` is
/// already a transaction. Returns `false` when no class had that ID.
#[instrument(skip(db))]
pub async fn delete_class<C>(db: &C, class_id: i64) -> Result<bool>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let removed_entries = Attendance::delete_many()
        .filter(attendance::Column::ClassId.eq(class_id))
        .exec(&txn)
        .await?
        .rows_affected;
    let removed = Class::delete_by_id(class_id).exec(&txn).await?.rows_affected;

    txn.commit().await?;

    if removed > 0 {
        info!("Deleted class {class_id} and {removed_entries} attendance entries");
    }
    Ok(removed > 0)
}

/// Inserts the configured classes that don't exist yet. Returns how many were added.
pub async fn seed_classes(db: &DatabaseConnection, classes: &[ClassConfig]) -> Result<usize> {
    let mut added = 0;
    for config in classes {
        if get_class_by_code(db, &config.code, &config.year_group)
            .await?
            .is_some()
        {
            continue;
        }
        create_class(db, &config.code, &config.year_group, config.male, config.female).await?;
        added += 1;
    }
    Ok(added)
}
