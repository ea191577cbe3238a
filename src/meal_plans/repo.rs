use anyhow::Result;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct MealPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub start_date: Date,
    pub end_date: Date,
    pub target_calories: Option<i32>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct MealPlanEntry {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub recipe_id: Uuid,
    pub meal_date: Date,
    pub meal_type: String,
    pub servings: i32,
    pub position_order: i32,
}

pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    title: &str,
    start_date: Date,
    end_date: Date,
    target_calories: Option<i32>,
) -> Result<MealPlan> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "INSERT INTO meal_plans (user_id, title, start_date, end_date, target_calories)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, user_id, title, start_date, end_date, target_calories, created_at, updated_at",
    )
    .bind(user_id)
    .bind(title.trim())
    .bind(start_date)
    .bind(end_date)
    .bind(target_calories)
    .fetch_one(db)
    .await?;
    Ok(plan)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "SELECT id, user_id, title, start_date, end_date, target_calories, created_at, updated_at
         FROM meal_plans WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(plan)
}

pub async fn list_for_user(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<MealPlan>> {
    let plans = sqlx::query_as::<_, MealPlan>(
        "SELECT id, user_id, title, start_date, end_date, target_calories, created_at, updated_at
         FROM meal_plans WHERE user_id = $1
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(plans)
}

pub async fn count_for_user(db: &PgPool, user_id: Uuid) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM meal_plans WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    title: Option<&str>,
    start_date: Option<Date>,
    end_date: Option<Date>,
    target_calories: Option<i32>,
) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "UPDATE meal_plans SET
             title = COALESCE($2, title),
             start_date = COALESCE($3, start_date),
             end_date = COALESCE($4, end_date),
             target_calories = COALESCE($5, target_calories),
             updated_at = now()
         WHERE id = $1
         RETURNING id, user_id, title, start_date, end_date, target_calories, created_at, updated_at",
    )
    .bind(id)
    .bind(title.map(str::trim))
    .bind(start_date)
    .bind(end_date)
    .bind(target_calories)
    .fetch_optional(db)
    .await?;
    Ok(plan)
}

pub async fn delete(db: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM meal_plans WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn add_entry(
    db: &PgPool,
    meal_plan_id: Uuid,
    recipe_id: Uuid,
    meal_date: Date,
    meal_type: &str,
    servings: i32,
    position_order: i32,
) -> Result<MealPlanEntry> {
    let entry = sqlx::query_as::<_, MealPlanEntry>(
        "INSERT INTO meal_plan_recipes (meal_plan_id, recipe_id, meal_date, meal_type, servings, \
             position_order)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, meal_plan_id, recipe_id, meal_date, meal_type, servings, position_order",
    )
    .bind(meal_plan_id)
    .bind(recipe_id)
    .bind(meal_date)
    .bind(meal_type)
    .bind(servings)
    .bind(position_order)
    .fetch_one(db)
    .await?;
    Ok(entry)
}

pub async fn entries_for(db: &PgPool, meal_plan_id: Uuid) -> Result<Vec<MealPlanEntry>> {
    let entries = sqlx::query_as::<_, MealPlanEntry>(
        "SELECT id, meal_plan_id, recipe_id, meal_date, meal_type, servings, position_order
         FROM meal_plan_recipes WHERE meal_plan_id = $1
         ORDER BY meal_date, position_order",
    )
    .bind(meal_plan_id)
    .fetch_all(db)
    .await?;
    Ok(entries)
}

pub async fn find_entry(
    db: &PgPool,
    meal_plan_id: Uuid,
    entry_id: Uuid,
) -> Result<Option<MealPlanEntry>> {
    let entry = sqlx::query_as::<_, MealPlanEntry>(
        "SELECT id, meal_plan_id, recipe_id, meal_date, meal_type, servings, position_order
         FROM meal_plan_recipes WHERE id = $1 AND meal_plan_id = $2",
    )
    .bind(entry_id)
    .bind(meal_plan_id)
    .fetch_optional(db)
    .await?;
    Ok(entry)
}

pub async fn delete_entry(db: &PgPool, entry_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM meal_plan_recipes WHERE id = $1")
        .bind(entry_id)
        .execute(db)
        .await?;
    Ok(())
}
