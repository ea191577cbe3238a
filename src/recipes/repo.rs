use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::recipes::dto::InstructionStep;
use crate::recipes::services::CatalogStore;

/// Fully hydrated recipe: scalar columns plus resolved ingredient usages.
#[derive(Debug, Clone)]
pub struct RecipeDetails {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Vec<InstructionStep>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub servings: i32,
    pub difficulty_level: String,
    pub cuisine_type: Option<String>,
    pub dietary_tags: Vec<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub external_id: Option<i64>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
    pub created_by_user_id: Option<Uuid>,
    pub average_rating: f64,
    pub rating_count: i32,
    pub ingredients: Vec<IngredientUsage>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct IngredientUsage {
    pub ingredient_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub preparation_note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: Option<String>,
    pub instructions: Vec<InstructionStep>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub servings: i32,
    pub difficulty_level: String,
    pub cuisine_type: Option<String>,
    pub dietary_tags: Vec<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub external_id: Option<i64>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
    pub created_by_user_id: Option<Uuid>,
    pub ingredients: Vec<NewIngredientLink>,
}

#[derive(Debug, Clone)]
pub struct NewIngredientLink {
    pub ingredient_id: Uuid,
    pub quantity: f64,
    pub unit: String,
    pub preparation_note: Option<String>,
}

/// Partial update. `None` leaves the column unchanged; provided lists replace
/// the stored ones wholesale.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<Vec<InstructionStep>>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty_level: Option<String>,
    pub cuisine_type: Option<String>,
    pub dietary_tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
    pub ingredients: Option<Vec<NewIngredientLink>>,
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    instructions: Json<Vec<InstructionStep>>,
    prep_time_minutes: Option<i32>,
    cook_time_minutes: Option<i32>,
    servings: i32,
    difficulty_level: String,
    cuisine_type: Option<String>,
    dietary_tags: Json<Vec<String>>,
    image_url: Option<String>,
    source_url: Option<String>,
    external_id: Option<i64>,
    calories: Option<f64>,
    protein: Option<f64>,
    carbohydrates: Option<f64>,
    fat: Option<f64>,
    created_by_user_id: Option<Uuid>,
    average_rating: f64,
    rating_count: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl RecipeRow {
    fn into_details(self, ingredients: Vec<IngredientUsage>) -> RecipeDetails {
        RecipeDetails {
            id: self.id,
            title: self.title,
            description: self.description,
            instructions: self.instructions.0,
            prep_time_minutes: self.prep_time_minutes,
            cook_time_minutes: self.cook_time_minutes,
            servings: self.servings,
            difficulty_level: self.difficulty_level,
            cuisine_type: self.cuisine_type,
            dietary_tags: self.dietary_tags.0,
            image_url: self.image_url,
            source_url: self.source_url,
            external_id: self.external_id,
            calories: self.calories,
            protein: self.protein,
            carbohydrates: self.carbohydrates,
            fat: self.fat,
            created_by_user_id: self.created_by_user_id,
            average_rating: self.average_rating,
            rating_count: self.rating_count,
            ingredients,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UsageRow {
    recipe_id: Uuid,
    ingredient_id: Uuid,
    name: String,
    category: Option<String>,
    quantity: f64,
    unit: String,
    preparation_note: Option<String>,
}

const RECIPE_COLUMNS: &str = "id, title, description, instructions, prep_time_minutes, \
     cook_time_minutes, servings, difficulty_level, cuisine_type, dietary_tags, image_url, \
     source_url, external_id, calories, protein, carbohydrates, fat, created_by_user_id, \
     average_rating, rating_count, created_at, updated_at";

pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn usages_for(
        &self,
        recipe_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<IngredientUsage>>, ServiceError> {
        let rows = sqlx::query_as::<_, UsageRow>(
            "SELECT ri.recipe_id, ri.ingredient_id, i.name, i.category, ri.quantity, ri.unit, \
                    ri.preparation_note
             FROM recipe_ingredients ri
             JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = ANY($1)
             ORDER BY ri.created_at, i.name",
        )
        .bind(recipe_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(ServiceError::internal)?;

        let mut grouped: HashMap<Uuid, Vec<IngredientUsage>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.recipe_id)
                .or_default()
                .push(IngredientUsage {
                    ingredient_id: row.ingredient_id,
                    name: row.name,
                    category: row.category,
                    quantity: row.quantity,
                    unit: row.unit,
                    preparation_note: row.preparation_note,
                });
        }
        Ok(grouped)
    }

    async fn hydrate(&self, row: RecipeRow) -> Result<RecipeDetails, ServiceError> {
        let mut usages = self.usages_for(&[row.id]).await?;
        let ingredients = usages.remove(&row.id).unwrap_or_default();
        Ok(row.into_details(ingredients))
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn find_recipe(&self, id: Uuid) -> Result<Option<RecipeDetails>, ServiceError> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::internal)?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_recipe_by_external_id(
        &self,
        external_id: i64,
    ) -> Result<Option<RecipeDetails>, ServiceError> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::internal)?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_recipes(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecipeDetails>, ServiceError> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(ServiceError::internal)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut usages = self.usages_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let ingredients = usages.remove(&row.id).unwrap_or_default();
                row.into_details(ingredients)
            })
            .collect())
    }

    async fn count_recipes(&self) -> Result<i64, ServiceError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes")
            .fetch_one(&self.pool)
            .await
            .map_err(ServiceError::internal)?;
        Ok(count)
    }

    async fn create_recipe(&self, new: &NewRecipe) -> Result<RecipeDetails, ServiceError> {
        let mut tx = self.pool.begin().await.map_err(ServiceError::internal)?;

        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "INSERT INTO recipes (title, description, instructions, prep_time_minutes, \
                 cook_time_minutes, servings, difficulty_level, cuisine_type, dietary_tags, \
                 image_url, source_url, external_id, calories, protein, carbohydrates, fat, \
                 created_by_user_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(Json(&new.instructions))
        .bind(new.prep_time_minutes)
        .bind(new.cook_time_minutes)
        .bind(new.servings)
        .bind(&new.difficulty_level)
        .bind(&new.cuisine_type)
        .bind(Json(&new.dietary_tags))
        .bind(&new.image_url)
        .bind(&new.source_url)
        .bind(new.external_id)
        .bind(new.calories)
        .bind(new.protein)
        .bind(new.carbohydrates)
        .bind(new.fat)
        .bind(new.created_by_user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_recipe_insert_error)?;

        for link in &new.ingredients {
            sqlx::query(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit, \
                     preparation_note)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(row.id)
            .bind(link.ingredient_id)
            .bind(link.quantity)
            .bind(&link.unit)
            .bind(&link.preparation_note)
            .execute(&mut *tx)
            .await
            .map_err(map_link_insert_error)?;
        }

        tx.commit().await.map_err(ServiceError::internal)?;
        self.hydrate(row).await
    }

    async fn replace_recipe(
        &self,
        id: Uuid,
        changes: &RecipeChanges,
    ) -> Result<RecipeDetails, ServiceError> {
        let mut tx = self.pool.begin().await.map_err(ServiceError::internal)?;

        sqlx::query(
            "UPDATE recipes SET
                 title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 instructions = COALESCE($4, instructions),
                 prep_time_minutes = COALESCE($5, prep_time_minutes),
                 cook_time_minutes = COALESCE($6, cook_time_minutes),
                 servings = COALESCE($7, servings),
                 difficulty_level = COALESCE($8, difficulty_level),
                 cuisine_type = COALESCE($9, cuisine_type),
                 dietary_tags = COALESCE($10, dietary_tags),
                 image_url = COALESCE($11, image_url),
                 source_url = COALESCE($12, source_url),
                 calories = COALESCE($13, calories),
                 protein = COALESCE($14, protein),
                 carbohydrates = COALESCE($15, carbohydrates),
                 fat = COALESCE($16, fat),
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.instructions.as_ref().map(Json))
        .bind(changes.prep_time_minutes)
        .bind(changes.cook_time_minutes)
        .bind(changes.servings)
        .bind(&changes.difficulty_level)
        .bind(&changes.cuisine_type)
        .bind(changes.dietary_tags.as_ref().map(Json))
        .bind(&changes.image_url)
        .bind(&changes.source_url)
        .bind(changes.calories)
        .bind(changes.protein)
        .bind(changes.carbohydrates)
        .bind(changes.fat)
        .execute(&mut *tx)
        .await
        .map_err(ServiceError::internal)?;

        if let Some(links) = &changes.ingredients {
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(ServiceError::internal)?;
            for link in links {
                sqlx::query(
                    "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit, \
                         preparation_note)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(id)
                .bind(link.ingredient_id)
                .bind(link.quantity)
                .bind(&link.unit)
                .bind(&link.preparation_note)
                .execute(&mut *tx)
                .await
                .map_err(map_link_insert_error)?;
            }
        }

        tx.commit().await.map_err(ServiceError::internal)?;
        self.find_recipe(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recipe not found".into()))
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ServiceError::internal)?;
        Ok(())
    }

    async fn get_or_create_ingredient(
        &self,
        name: &str,
        category: Option<&str>,
        calories_per_unit: Option<f64>,
    ) -> Result<Uuid, ServiceError> {
        crate::ingredients::repo::get_or_create(&self.pool, name, category, calories_per_unit)
            .await
            .map(|i| i.id)
            .map_err(ServiceError::internal)
    }
}

fn map_recipe_insert_error(e: sqlx::Error) -> ServiceError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() && db.constraint() == Some("uq_recipes_external_id") {
            return ServiceError::Conflict("Recipe already imported from this source".into());
        }
    }
    ServiceError::internal(e)
}

fn map_link_insert_error(e: sqlx::Error) -> ServiceError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            return ServiceError::NotFound("Ingredient not found".into());
        }
        if db.is_unique_violation() && db.constraint() == Some("uq_recipe_ingredient") {
            return ServiceError::Validation(
                "The same ingredient appears twice in the recipe".into(),
            );
        }
        if db.is_check_violation() {
            return ServiceError::Validation(
                "Ingredient quantity must be greater than 0".into(),
            );
        }
    }
    ServiceError::internal(e)
}
