use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::PageMeta;
use crate::error::ServiceError;
use crate::recipes::dto::{
    CreateRecipeRequest, ExternalRecipeSummary, RecipeIngredientInput, UpdateRecipeRequest,
};
use crate::recipes::mapper::{map_provider_recipe, MappedRecipe};
use crate::recipes::repo::{
    NewIngredientLink, NewRecipe, PgCatalog, RecipeChanges, RecipeDetails,
};
use crate::spoonacular::client::RecipeProvider;
use crate::state::AppState;

/// Persistence seam for the recipe catalog. The production implementation is
/// [`PgCatalog`]; tests use an in-memory store.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_recipe(&self, id: Uuid) -> Result<Option<RecipeDetails>, ServiceError>;

    async fn find_recipe_by_external_id(
        &self,
        external_id: i64,
    ) -> Result<Option<RecipeDetails>, ServiceError>;

    async fn list_recipes(&self, limit: i64, offset: i64)
        -> Result<Vec<RecipeDetails>, ServiceError>;

    async fn count_recipes(&self) -> Result<i64, ServiceError>;

    async fn create_recipe(&self, new: &NewRecipe) -> Result<RecipeDetails, ServiceError>;

    async fn replace_recipe(
        &self,
        id: Uuid,
        changes: &RecipeChanges,
    ) -> Result<RecipeDetails, ServiceError>;

    async fn delete_recipe(&self, id: Uuid) -> Result<(), ServiceError>;

    async fn get_or_create_ingredient(
        &self,
        name: &str,
        category: Option<&str>,
        calories_per_unit: Option<f64>,
    ) -> Result<Uuid, ServiceError>;
}

pub struct RecipeCatalog {
    store: Arc<dyn CatalogStore>,
    provider: Arc<dyn RecipeProvider>,
}

impl RecipeCatalog {
    pub fn new(store: Arc<dyn CatalogStore>, provider: Arc<dyn RecipeProvider>) -> Self {
        Self { store, provider }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            Arc::new(PgCatalog::new(state.db.clone())),
            state.provider.clone(),
        )
    }

    /// Imports an external recipe. Importing the same external id twice is
    /// idempotent: the existing row is returned without contacting the
    /// provider again.
    pub async fn import_by_external_id(
        &self,
        external_id: i64,
        acting_user: Uuid,
    ) -> Result<RecipeDetails, ServiceError> {
        if let Some(existing) = self.store.find_recipe_by_external_id(external_id).await? {
            info!(external_id, "recipe already imported, returning existing row");
            return Ok(existing);
        }

        let raw = self.provider.get_details(external_id, true).await?;
        let mapped = map_provider_recipe(&raw, external_id)?;

        if mapped.ingredients.is_empty() {
            warn!(external_id, title = %mapped.title, "no ingredients mapped, aborting import");
            return Err(ServiceError::Validation(format!(
                "Recipe {external_id} ('{}'): No ingredients mapped.",
                mapped.title
            )));
        }

        // Each resolved ingredient commits on its own; a failure here aborts
        // the import but leaves already-created ingredients in place for the
        // next attempt.
        let mut links: Vec<NewIngredientLink> = Vec::with_capacity(mapped.ingredients.len());
        let mut seen = HashSet::new();
        for ingredient in &mapped.ingredients {
            let ingredient_id = self
                .store
                .get_or_create_ingredient(
                    &ingredient.name,
                    ingredient.category.as_deref(),
                    ingredient.calories_per_unit,
                )
                .await
                .map_err(|e| {
                    error!(name = %ingredient.name, error = %e, "failed to resolve ingredient");
                    e
                })?;
            if seen.insert(ingredient_id) {
                links.push(NewIngredientLink {
                    ingredient_id,
                    quantity: ingredient.quantity,
                    unit: ingredient.unit.clone(),
                    preparation_note: ingredient.preparation_note.clone(),
                });
            } else {
                info!(
                    external_id,
                    name = %ingredient.name,
                    "duplicate ingredient in provider payload, keeping first occurrence"
                );
            }
        }
        if links.is_empty() {
            warn!(external_id, title = %mapped.title, "no ingredient links survived resolution");
            return Err(ServiceError::Validation(format!(
                "Recipe {external_id} ('{}'): No ingredients could be successfully processed.",
                mapped.title
            )));
        }

        if mapped.instructions.is_empty() {
            warn!(external_id, title = %mapped.title, "no instructions mapped, aborting import");
            return Err(ServiceError::Validation(format!(
                "Recipe {external_id} ('{}'): No instructions mapped.",
                mapped.title
            )));
        }

        let new = new_recipe_from_mapped(&mapped, links, acting_user);
        match self.store.create_recipe(&new).await {
            Ok(created) => Ok(created),
            // Two imports of the same id can race past the existing check;
            // the unique index on external_id decides the winner and the
            // loser serves the winner's row.
            Err(ServiceError::Conflict(_)) => {
                info!(external_id, "concurrent import finished first, returning existing row");
                self.store
                    .find_recipe_by_external_id(external_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::Persistence(format!(
                            "recipe for external id {external_id} missing after import conflict"
                        ))
                    })
            }
            Err(e) => {
                error!(external_id, error = %e, "failed to persist imported recipe");
                Err(ServiceError::Persistence(format!(
                    "import of external recipe {external_id} failed: {e}"
                )))
            }
        }
    }

    /// Search the provider without persisting anything locally.
    pub async fn search_external(
        &self,
        query: &str,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<ExternalRecipeSummary>, PageMeta), ServiceError> {
        let offset = ((page - 1) * limit) as u32;
        let response = self.provider.search(query, offset, limit as u32).await?;

        let results = response
            .results
            .iter()
            .filter_map(|hit| {
                let external_id = hit.id?;
                Some(ExternalRecipeSummary {
                    external_id,
                    title: hit.title.clone().unwrap_or_default(),
                    image_url: hit.image.clone(),
                    source_url: hit.source_url.clone(),
                    ready_in_minutes: hit.ready_in_minutes,
                    servings: hit.servings,
                })
            })
            .collect();

        let meta = PageMeta::new(page, limit, response.total_results.unwrap_or(0));
        Ok((results, meta))
    }

    pub async fn create(
        &self,
        req: &CreateRecipeRequest,
        acting_user: Uuid,
    ) -> Result<RecipeDetails, ServiceError> {
        req.validate()?;
        let new = NewRecipe {
            title: req.title.trim().to_string(),
            description: req.description.clone(),
            instructions: req.instructions.clone(),
            prep_time_minutes: req.prep_time_minutes,
            cook_time_minutes: req.cook_time_minutes,
            servings: req.servings,
            difficulty_level: req.difficulty_level.clone(),
            cuisine_type: req.cuisine_type.clone(),
            dietary_tags: req.dietary_tags.clone(),
            image_url: req.image_url.clone(),
            source_url: req.source_url.clone(),
            external_id: None,
            calories: req.calories,
            protein: req.protein,
            carbohydrates: req.carbohydrates,
            fat: req.fat,
            created_by_user_id: Some(acting_user),
            ingredients: req.ingredients.iter().map(link_from_input).collect(),
        };
        self.store.create_recipe(&new).await
    }

    pub async fn get(&self, id: Uuid) -> Result<RecipeDetails, ServiceError> {
        self.store
            .find_recipe(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recipe not found".into()))
    }

    pub async fn list(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<RecipeDetails>, PageMeta), ServiceError> {
        let items = self.store.list_recipes(limit, (page - 1) * limit).await?;
        let total = self.store.count_recipes().await?;
        Ok((items, PageMeta::new(page, limit, total)))
    }

    /// Existence is checked before ownership so that a missing recipe is
    /// always a 404, never a 403.
    pub async fn update(
        &self,
        id: Uuid,
        req: &UpdateRecipeRequest,
        acting_user: Uuid,
    ) -> Result<RecipeDetails, ServiceError> {
        req.validate()?;
        let existing = self.get(id).await?;
        if existing.created_by_user_id != Some(acting_user) {
            return Err(ServiceError::Forbidden(
                "Not authorized to update this recipe".into(),
            ));
        }
        let changes = RecipeChanges {
            title: req.title.as_ref().map(|t| t.trim().to_string()),
            description: req.description.clone(),
            instructions: req.instructions.clone(),
            prep_time_minutes: req.prep_time_minutes,
            cook_time_minutes: req.cook_time_minutes,
            servings: req.servings,
            difficulty_level: req.difficulty_level.clone(),
            cuisine_type: req.cuisine_type.clone(),
            dietary_tags: req.dietary_tags.clone(),
            image_url: req.image_url.clone(),
            source_url: req.source_url.clone(),
            calories: req.calories,
            protein: req.protein,
            carbohydrates: req.carbohydrates,
            fat: req.fat,
            ingredients: req
                .ingredients
                .as_ref()
                .map(|list| list.iter().map(link_from_input).collect()),
        };
        self.store.replace_recipe(id, &changes).await
    }

    pub async fn delete(&self, id: Uuid, acting_user: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if existing.created_by_user_id != Some(acting_user) {
            return Err(ServiceError::Forbidden(
                "Not authorized to delete this recipe".into(),
            ));
        }
        self.store.delete_recipe(id).await
    }
}

fn link_from_input(input: &RecipeIngredientInput) -> NewIngredientLink {
    NewIngredientLink {
        ingredient_id: input.ingredient_id,
        quantity: input.quantity,
        unit: input.unit.trim().to_string(),
        preparation_note: input.preparation_note.clone(),
    }
}

fn new_recipe_from_mapped(
    mapped: &MappedRecipe,
    links: Vec<NewIngredientLink>,
    acting_user: Uuid,
) -> NewRecipe {
    NewRecipe {
        title: mapped.title.clone(),
        description: mapped.description.clone(),
        instructions: mapped.instructions.clone(),
        prep_time_minutes: mapped.prep_time_minutes,
        cook_time_minutes: mapped.cook_time_minutes,
        servings: mapped.servings.unwrap_or(4),
        difficulty_level: mapped.difficulty_level.clone(),
        cuisine_type: mapped.cuisine_type.clone(),
        dietary_tags: mapped.dietary_tags.clone(),
        image_url: mapped.image_url.clone(),
        source_url: mapped.source_url.clone(),
        external_id: Some(mapped.external_id),
        calories: mapped.calories,
        protein: mapped.protein,
        carbohydrates: mapped.carbohydrates,
        fat: mapped.fat,
        created_by_user_id: Some(acting_user),
        ingredients: links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::repo::IngredientUsage;
    use crate::spoonacular::client::{MockProvider, ProviderError};
    use crate::spoonacular::types::{RawRecipe, RawSearchResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use time::OffsetDateTime;

    struct StoredIngredient {
        id: Uuid,
        name: String,
        category: Option<String>,
        calories_per_unit: Option<f64>,
    }

    #[derive(Default)]
    struct MemoryCatalog {
        recipes: Mutex<Vec<RecipeDetails>>,
        ingredients: Mutex<Vec<StoredIngredient>>,
    }

    impl MemoryCatalog {
        fn ingredient_count(&self) -> usize {
            self.ingredients.lock().unwrap().len()
        }

        fn ingredient_names(&self) -> Vec<String> {
            self.ingredients
                .lock()
                .unwrap()
                .iter()
                .map(|i| i.name.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CatalogStore for MemoryCatalog {
        async fn find_recipe(&self, id: Uuid) -> Result<Option<RecipeDetails>, ServiceError> {
            Ok(self
                .recipes
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned())
        }

        async fn find_recipe_by_external_id(
            &self,
            external_id: i64,
        ) -> Result<Option<RecipeDetails>, ServiceError> {
            Ok(self
                .recipes
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.external_id == Some(external_id))
                .cloned())
        }

        async fn list_recipes(
            &self,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<RecipeDetails>, ServiceError> {
            let recipes = self.recipes.lock().unwrap();
            Ok(recipes
                .iter()
                .rev()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn count_recipes(&self) -> Result<i64, ServiceError> {
            Ok(self.recipes.lock().unwrap().len() as i64)
        }

        async fn create_recipe(&self, new: &NewRecipe) -> Result<RecipeDetails, ServiceError> {
            let mut recipes = self.recipes.lock().unwrap();
            if let Some(external_id) = new.external_id {
                if recipes.iter().any(|r| r.external_id == Some(external_id)) {
                    return Err(ServiceError::Conflict(
                        "Recipe already imported from this source".into(),
                    ));
                }
            }
            let ingredients = self.ingredients.lock().unwrap();
            let usages = new
                .ingredients
                .iter()
                .map(|link| {
                    let stored = ingredients
                        .iter()
                        .find(|i| i.id == link.ingredient_id)
                        .ok_or_else(|| ServiceError::NotFound("Ingredient not found".into()))?;
                    Ok(IngredientUsage {
                        ingredient_id: link.ingredient_id,
                        name: stored.name.clone(),
                        category: stored.category.clone(),
                        quantity: link.quantity,
                        unit: link.unit.clone(),
                        preparation_note: link.preparation_note.clone(),
                    })
                })
                .collect::<Result<Vec<_>, ServiceError>>()?;

            let now = OffsetDateTime::now_utc();
            let details = RecipeDetails {
                id: Uuid::new_v4(),
                title: new.title.clone(),
                description: new.description.clone(),
                instructions: new.instructions.clone(),
                prep_time_minutes: new.prep_time_minutes,
                cook_time_minutes: new.cook_time_minutes,
                servings: new.servings,
                difficulty_level: new.difficulty_level.clone(),
                cuisine_type: new.cuisine_type.clone(),
                dietary_tags: new.dietary_tags.clone(),
                image_url: new.image_url.clone(),
                source_url: new.source_url.clone(),
                external_id: new.external_id,
                calories: new.calories,
                protein: new.protein,
                carbohydrates: new.carbohydrates,
                fat: new.fat,
                created_by_user_id: new.created_by_user_id,
                average_rating: 0.0,
                rating_count: 0,
                ingredients: usages,
                created_at: now,
                updated_at: now,
            };
            recipes.push(details.clone());
            Ok(details)
        }

        async fn replace_recipe(
            &self,
            id: Uuid,
            changes: &RecipeChanges,
        ) -> Result<RecipeDetails, ServiceError> {
            let mut recipes = self.recipes.lock().unwrap();
            let recipe = recipes
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| ServiceError::NotFound("Recipe not found".into()))?;
            if let Some(title) = &changes.title {
                recipe.title = title.clone();
            }
            if let Some(steps) = &changes.instructions {
                recipe.instructions = steps.clone();
            }
            if let Some(servings) = changes.servings {
                recipe.servings = servings;
            }
            recipe.updated_at = OffsetDateTime::now_utc();
            Ok(recipe.clone())
        }

        async fn delete_recipe(&self, id: Uuid) -> Result<(), ServiceError> {
            self.recipes.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }

        async fn get_or_create_ingredient(
            &self,
            name: &str,
            category: Option<&str>,
            calories_per_unit: Option<f64>,
        ) -> Result<Uuid, ServiceError> {
            let normalized = crate::ingredients::repo::normalize_name(name);
            let mut ingredients = self.ingredients.lock().unwrap();
            if let Some(existing) = ingredients
                .iter()
                .find(|i| crate::ingredients::repo::normalize_name(&i.name) == normalized)
            {
                return Ok(existing.id);
            }
            let id = Uuid::new_v4();
            ingredients.push(StoredIngredient {
                id,
                name: name.trim().to_string(),
                category: Some(category.unwrap_or("Unknown").to_string()),
                calories_per_unit,
            });
            Ok(id)
        }
    }

    /// Pretends the existing-check missed while another import already
    /// persisted the same external id, so create hits the unique index.
    struct RacingStore {
        inner: MemoryCatalog,
        hide_existing_once: AtomicBool,
    }

    #[async_trait]
    impl CatalogStore for RacingStore {
        async fn find_recipe(&self, id: Uuid) -> Result<Option<RecipeDetails>, ServiceError> {
            self.inner.find_recipe(id).await
        }

        async fn find_recipe_by_external_id(
            &self,
            external_id: i64,
        ) -> Result<Option<RecipeDetails>, ServiceError> {
            if self.hide_existing_once.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_recipe_by_external_id(external_id).await
        }

        async fn list_recipes(
            &self,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<RecipeDetails>, ServiceError> {
            self.inner.list_recipes(limit, offset).await
        }

        async fn count_recipes(&self) -> Result<i64, ServiceError> {
            self.inner.count_recipes().await
        }

        async fn create_recipe(&self, new: &NewRecipe) -> Result<RecipeDetails, ServiceError> {
            self.inner.create_recipe(new).await
        }

        async fn replace_recipe(
            &self,
            id: Uuid,
            changes: &RecipeChanges,
        ) -> Result<RecipeDetails, ServiceError> {
            self.inner.replace_recipe(id, changes).await
        }

        async fn delete_recipe(&self, id: Uuid) -> Result<(), ServiceError> {
            self.inner.delete_recipe(id).await
        }

        async fn get_or_create_ingredient(
            &self,
            name: &str,
            category: Option<&str>,
            calories_per_unit: Option<f64>,
        ) -> Result<Uuid, ServiceError> {
            self.inner
                .get_or_create_ingredient(name, category, calories_per_unit)
                .await
        }
    }

    fn provider_payload() -> RawRecipe {
        serde_json::from_value(json!({
            "id": 716429,
            "title": "Pasta with Garlic, Scallions, Cauliflower & Breadcrumbs",
            "summary": "<b>A classic</b> weeknight pasta.",
            "image": "https://img.spoonacular.com/recipes/716429-556x370.jpg",
            "servings": 2,
            "readyInMinutes": 45,
            "analyzedInstructions": [{"steps": [
                {"number": 1, "step": "Bring a large pot of salted water to a boil."},
                {"number": 2, "step": "Cook the pasta until al dente."},
                {"number": 3, "step": "Toss with cauliflower and breadcrumbs."}
            ]}],
            "extendedIngredients": [
                {"nameClean": "cauliflower", "amount": 2.0, "unit": "cups", "aisle": "Produce"},
                {"nameClean": "pasta", "amount": 6.0, "unit": "ounces", "aisle": "Pasta and Rice"}
            ],
            "nutrition": {"nutrients": [
                {"name": "Calories", "amount": 550.0},
                {"name": "Protein", "amount": 20.0},
                {"name": "Fat", "amount": 15.0},
                {"name": "Carbohydrates", "amount": 80.0}
            ]}
        }))
        .unwrap()
    }

    fn catalog_with(
        store: Arc<dyn CatalogStore>,
        provider: Arc<MockProvider>,
    ) -> RecipeCatalog {
        RecipeCatalog::new(store, provider)
    }

    #[tokio::test]
    async fn import_persists_a_fully_mapped_recipe() {
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new().with_details(716429, provider_payload()));
        let catalog = catalog_with(store.clone(), provider);
        let user = Uuid::new_v4();

        let recipe = catalog.import_by_external_id(716429, user).await.unwrap();

        assert_eq!(
            recipe.title,
            "Pasta with Garlic, Scallions, Cauliflower & Breadcrumbs"
        );
        assert_eq!(recipe.external_id, Some(716429));
        assert_eq!(recipe.created_by_user_id, Some(user));
        assert_eq!(recipe.servings, 2);
        assert_eq!(recipe.cook_time_minutes, Some(45));
        assert_eq!(recipe.prep_time_minutes, None);

        assert_eq!(recipe.instructions.len(), 3);
        assert_eq!(recipe.instructions[0].step_number, 1);
        assert_eq!(recipe.instructions[2].step_number, 3);

        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].name, "cauliflower");
        assert_eq!(recipe.ingredients[0].quantity, 2.0);
        assert_eq!(recipe.ingredients[1].name, "pasta");

        assert_eq!(recipe.calories, Some(550.0));
        assert_eq!(recipe.protein, Some(20.0));
        assert_eq!(recipe.fat, Some(15.0));
        assert_eq!(recipe.carbohydrates, Some(80.0));

        assert_eq!(store.ingredient_count(), 2);
    }

    #[tokio::test]
    async fn import_twice_returns_existing_without_second_fetch() {
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new().with_details(716429, provider_payload()));
        let catalog = catalog_with(store.clone(), provider.clone());
        let user = Uuid::new_v4();

        let first = catalog.import_by_external_id(716429, user).await.unwrap();
        let second = catalog.import_by_external_id(716429, user).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.count_recipes().await.unwrap(), 1);
        assert_eq!(provider.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn import_aborts_before_any_write_when_no_ingredients_map() {
        let payload: RawRecipe = serde_json::from_value(json!({
            "id": 5,
            "title": "Ghost Recipe",
            "analyzedInstructions": [{"steps": [{"number": 1, "step": "Stir well."}]}],
            "extendedIngredients": [{"name": "Salt"}]
        }))
        .unwrap();
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new().with_details(5, payload));
        let catalog = catalog_with(store.clone(), provider);

        let err = catalog
            .import_by_external_id(5, Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            ServiceError::Validation(msg) if msg.contains("No ingredients mapped")
        ));
        assert_eq!(store.count_recipes().await.unwrap(), 0);
        assert_eq!(store.ingredient_count(), 0);
    }

    #[tokio::test]
    async fn import_aborts_after_resolution_when_no_instructions_map() {
        let payload: RawRecipe = serde_json::from_value(json!({
            "id": 6,
            "title": "Silent Recipe",
            "extendedIngredients": [
                {"nameClean": "flour", "amount": 1.0, "unit": "cup"}
            ]
        }))
        .unwrap();
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new().with_details(6, payload));
        let catalog = catalog_with(store.clone(), provider);

        let err = catalog
            .import_by_external_id(6, Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            ServiceError::Validation(msg) if msg.contains("No instructions mapped")
        ));
        assert_eq!(store.count_recipes().await.unwrap(), 0);
        // Resolved ingredients keep their own commits even though the recipe
        // was never written.
        assert_eq!(store.ingredient_count(), 1);
    }

    #[tokio::test]
    async fn import_propagates_provider_failures() {
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(
            MockProvider::new()
                .with_details_error(8, ProviderError::RateLimited("points limit".into()))
                .with_details_error(
                    9,
                    ProviderError::Request {
                        status: Some(500),
                        message: "upstream broke".into(),
                    },
                ),
        );
        let catalog = catalog_with(store, provider);

        let err = catalog
            .import_by_external_id(8, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited(_)));

        let err = catalog
            .import_by_external_id(9, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Provider {
                status: Some(500),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn lost_import_race_returns_the_winner() {
        let user = Uuid::new_v4();
        let inner = MemoryCatalog::default();
        let winner_links = vec![NewIngredientLink {
            ingredient_id: inner
                .get_or_create_ingredient("cauliflower", Some("Produce"), None)
                .await
                .unwrap(),
            quantity: 2.0,
            unit: "cups".into(),
            preparation_note: None,
        }];
        let mapped = map_provider_recipe(&provider_payload(), 716429).unwrap();
        let winner = inner
            .create_recipe(&new_recipe_from_mapped(&mapped, winner_links, user))
            .await
            .unwrap();

        let store = Arc::new(RacingStore {
            inner,
            hide_existing_once: AtomicBool::new(true),
        });
        let provider = Arc::new(MockProvider::new().with_details(716429, provider_payload()));
        let catalog = catalog_with(store.clone(), provider.clone());

        let imported = catalog.import_by_external_id(716429, user).await.unwrap();

        assert_eq!(imported.id, winner.id);
        assert_eq!(provider.detail_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.count_recipes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn resolver_reuses_rows_across_case_and_whitespace() {
        let store = MemoryCatalog::default();
        let first = store
            .get_or_create_ingredient("Tomato", Some("Produce"), Some(22.0))
            .await
            .unwrap();
        let second = store
            .get_or_create_ingredient("tomato ", None, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.ingredient_names(), vec!["Tomato".to_string()]);
        // The first writer's attributes stick; later lookups do not overwrite.
        let stored = store.ingredients.lock().unwrap();
        assert_eq!(stored[0].calories_per_unit, Some(22.0));
        assert_eq!(stored[0].category.as_deref(), Some("Produce"));
    }

    #[tokio::test]
    async fn duplicate_payload_ingredients_link_once() {
        let payload: RawRecipe = serde_json::from_value(json!({
            "id": 11,
            "title": "Double Tomato",
            "analyzedInstructions": [{"steps": [{"number": 1, "step": "Chop and serve."}]}],
            "extendedIngredients": [
                {"nameClean": "tomato", "amount": 2.0, "unit": "pieces"},
                {"name": "Tomato ", "amount": 1.0, "unit": "piece"}
            ]
        }))
        .unwrap();
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new().with_details(11, payload));
        let catalog = catalog_with(store.clone(), provider);

        let recipe = catalog
            .import_by_external_id(11, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(recipe.ingredients.len(), 1);
        assert_eq!(recipe.ingredients[0].quantity, 2.0);
        assert_eq!(store.ingredient_count(), 1);
    }

    #[tokio::test]
    async fn external_search_maps_hits_and_pagination() {
        let response: RawSearchResponse = serde_json::from_value(json!({
            "results": [
                {"id": 716429, "title": "Pasta", "readyInMinutes": 45, "servings": 2},
                {"title": "No id, dropped"}
            ],
            "totalResults": 45
        }))
        .unwrap();
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new().with_search(response));
        let catalog = catalog_with(store, provider.clone());

        let (results, meta) = catalog.search_external("pasta", 2, 10).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].external_id, 716429);
        assert_eq!(results[0].ready_in_minutes, Some(45));
        assert_eq!(meta.current_page, 2);
        assert_eq!(meta.total_pages, 5);
        assert!(meta.has_next);
        assert!(meta.has_previous);
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.store.count_recipes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_checks_existence_before_ownership() {
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new());
        let catalog = catalog_with(store.clone(), provider);
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let ingredient_id = store
            .get_or_create_ingredient("flour", None, None)
            .await
            .unwrap();
        let req: CreateRecipeRequest = serde_json::from_value(json!({
            "title": "Plain Bread",
            "instructions": [{"stepNumber": 1, "instruction": "Bake until golden."}],
            "ingredients": [{"ingredientId": ingredient_id, "quantity": 3.0, "unit": "cups"}]
        }))
        .unwrap();
        let created = catalog.create(&req, owner).await.unwrap();

        let missing = catalog
            .update(Uuid::new_v4(), &UpdateRecipeRequest::default(), stranger)
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));

        let forbidden = catalog
            .update(created.id, &UpdateRecipeRequest::default(), stranger)
            .await
            .unwrap_err();
        assert!(matches!(forbidden, ServiceError::Forbidden(_)));

        let changes = UpdateRecipeRequest {
            title: Some("Sourdough Bread".into()),
            ..Default::default()
        };
        let updated = catalog.update(created.id, &changes, owner).await.unwrap();
        assert_eq!(updated.title, "Sourdough Bread");
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let store = Arc::new(MemoryCatalog::default());
        let provider = Arc::new(MockProvider::new());
        let catalog = catalog_with(store.clone(), provider);
        let owner = Uuid::new_v4();

        let ingredient_id = store
            .get_or_create_ingredient("flour", None, None)
            .await
            .unwrap();
        let req: CreateRecipeRequest = serde_json::from_value(json!({
            "title": "Plain Bread",
            "instructions": [{"stepNumber": 1, "instruction": "Bake until golden."}],
            "ingredients": [{"ingredientId": ingredient_id, "quantity": 3.0, "unit": "cups"}]
        }))
        .unwrap();
        let created = catalog.create(&req, owner).await.unwrap();

        let err = catalog
            .delete(created.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        catalog.delete(created.id, owner).await.unwrap();
        let err = catalog.get(created.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
