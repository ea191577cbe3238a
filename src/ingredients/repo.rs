use anyhow::Result;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub calories_per_unit: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Canonical lookup key. Names differing only in case or surrounding
/// whitespace resolve to the same ingredient row.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Ingredient>> {
    let row = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, category, calories_per_unit, created_at, updated_at
         FROM ingredients WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn find_by_normalized_name(db: &PgPool, normalized: &str) -> Result<Option<Ingredient>> {
    let row = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, category, calories_per_unit, created_at, updated_at
         FROM ingredients WHERE lower(name) = $1",
    )
    .bind(normalized)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn list(db: &PgPool, limit: i64, offset: i64) -> Result<Vec<Ingredient>> {
    let rows = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, category, calories_per_unit, created_at, updated_at
         FROM ingredients ORDER BY name LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn count(db: &PgPool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients")
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Returns the ingredient matching `name`, inserting it first if absent.
/// The insert is optimistic: when a concurrent caller wins the race on the
/// unique lower(name) index, the violation is swallowed and the winner's row
/// is returned. The stored name keeps the caller's casing, trimmed.
pub async fn get_or_create(
    db: &PgPool,
    name: &str,
    category: Option<&str>,
    calories_per_unit: Option<f64>,
) -> Result<Ingredient> {
    let normalized = normalize_name(name);
    if let Some(existing) = find_by_normalized_name(db, &normalized).await? {
        return Ok(existing);
    }

    let inserted = sqlx::query_as::<_, Ingredient>(
        "INSERT INTO ingredients (name, category, calories_per_unit)
         VALUES ($1, $2, $3)
         RETURNING id, name, category, calories_per_unit, created_at, updated_at",
    )
    .bind(name.trim())
    .bind(category.unwrap_or("Unknown"))
    .bind(calories_per_unit)
    .fetch_one(db)
    .await;

    match inserted {
        Ok(row) => Ok(row),
        Err(e) if is_unique_violation(&e) => find_by_normalized_name(db, &normalized)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("ingredient '{normalized}' missing after unique violation")
            }),
        Err(e) => {
            error!(error = %e, name, "ingredient insert failed");
            Err(e.into())
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
