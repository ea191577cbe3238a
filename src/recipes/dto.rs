use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::recipes::repo::{IngredientUsage, RecipeDetails};

/// One instruction step. Serialized into the `instructions` JSONB column and
/// onto the wire with the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionStep {
    pub step_number: i32,
    pub instruction: String,
    #[serde(default)]
    pub estimated_time_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientSummary {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredientResponse {
    pub ingredient: IngredientSummary,
    pub quantity: f64,
    pub unit: String,
    pub preparation_note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
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
    pub ingredients: Vec<RecipeIngredientResponse>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<RecipeDetails> for RecipeResponse {
    fn from(r: RecipeDetails) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            instructions: r.instructions,
            prep_time_minutes: r.prep_time_minutes,
            cook_time_minutes: r.cook_time_minutes,
            servings: r.servings,
            difficulty_level: r.difficulty_level,
            cuisine_type: r.cuisine_type,
            dietary_tags: r.dietary_tags,
            image_url: r.image_url,
            source_url: r.source_url,
            external_id: r.external_id,
            calories: r.calories,
            protein: r.protein,
            carbohydrates: r.carbohydrates,
            fat: r.fat,
            created_by_user_id: r.created_by_user_id,
            average_rating: r.average_rating,
            rating_count: r.rating_count,
            ingredients: r.ingredients.into_iter().map(Into::into).collect(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<IngredientUsage> for RecipeIngredientResponse {
    fn from(u: IngredientUsage) -> Self {
        Self {
            ingredient: IngredientSummary {
                id: u.ingredient_id,
                name: u.name,
                category: u.category,
            },
            quantity: u.quantity,
            unit: u.unit,
            preparation_note: u.preparation_note,
        }
    }
}

/// Search hit from the external provider, before any import happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRecipeSummary {
    pub external_id: i64,
    pub title: String,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub ready_in_minutes: Option<i32>,
    pub servings: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredientInput {
    pub ingredient_id: Uuid,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub preparation_note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecipeRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instructions: Vec<InstructionStep>,
    #[serde(default)]
    pub prep_time_minutes: Option<i32>,
    #[serde(default)]
    pub cook_time_minutes: Option<i32>,
    #[serde(default = "default_servings")]
    pub servings: i32,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: String,
    #[serde(default)]
    pub cuisine_type: Option<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbohydrates: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    pub ingredients: Vec<RecipeIngredientInput>,
}

fn default_servings() -> i32 {
    4
}

fn default_difficulty() -> String {
    "medium".into()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecipeRequest {
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
    pub ingredients: Option<Vec<RecipeIngredientInput>>,
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
    let len = title.trim().chars().count();
    if !(3..=255).contains(&len) {
        return Err(ServiceError::Validation(
            "Title must be between 3 and 255 characters".into(),
        ));
    }
    Ok(())
}

fn validate_instructions(steps: &[InstructionStep]) -> Result<(), ServiceError> {
    if steps.is_empty() {
        return Err(ServiceError::Validation(
            "At least one instruction step is required".into(),
        ));
    }
    for step in steps {
        if step.step_number < 1 {
            return Err(ServiceError::Validation(
                "Instruction step numbers must start at 1".into(),
            ));
        }
        if step.instruction.trim().chars().count() < 5 {
            return Err(ServiceError::Validation(
                "Instruction text must be at least 5 characters".into(),
            ));
        }
        if step.estimated_time_minutes.is_some_and(|m| m < 0) {
            return Err(ServiceError::Validation(
                "Estimated time must not be negative".into(),
            ));
        }
    }
    Ok(())
}

fn validate_ingredients(ingredients: &[RecipeIngredientInput]) -> Result<(), ServiceError> {
    if ingredients.is_empty() {
        return Err(ServiceError::Validation(
            "At least one ingredient is required".into(),
        ));
    }
    for item in ingredients {
        if item.quantity <= 0.0 {
            return Err(ServiceError::Validation(
                "Ingredient quantity must be greater than 0".into(),
            ));
        }
        let unit_len = item.unit.trim().chars().count();
        if !(1..=50).contains(&unit_len) {
            return Err(ServiceError::Validation(
                "Ingredient unit must be between 1 and 50 characters".into(),
            ));
        }
        if item
            .preparation_note
            .as_ref()
            .is_some_and(|n| n.chars().count() > 255)
        {
            return Err(ServiceError::Validation(
                "Preparation note must be at most 255 characters".into(),
            ));
        }
    }
    Ok(())
}

fn validate_nutrient(value: Option<f64>, name: &str) -> Result<(), ServiceError> {
    if value.is_some_and(|v| v < 0.0) {
        return Err(ServiceError::Validation(format!(
            "{name} must not be negative"
        )));
    }
    Ok(())
}

impl CreateRecipeRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_title(&self.title)?;
        validate_instructions(&self.instructions)?;
        validate_ingredients(&self.ingredients)?;
        if self.servings < 1 {
            return Err(ServiceError::Validation(
                "Servings must be at least 1".into(),
            ));
        }
        if self.difficulty_level.chars().count() > 20 {
            return Err(ServiceError::Validation(
                "Difficulty level must be at most 20 characters".into(),
            ));
        }
        validate_nutrient(self.calories, "Calories")?;
        validate_nutrient(self.protein, "Protein")?;
        validate_nutrient(self.carbohydrates, "Carbohydrates")?;
        validate_nutrient(self.fat, "Fat")?;
        Ok(())
    }
}

impl UpdateRecipeRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(steps) = &self.instructions {
            validate_instructions(steps)?;
        }
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        if self.servings.is_some_and(|s| s < 1) {
            return Err(ServiceError::Validation(
                "Servings must be at least 1".into(),
            ));
        }
        validate_nutrient(self.calories, "Calories")?;
        validate_nutrient(self.protein, "Protein")?;
        validate_nutrient(self.carbohydrates, "Carbohydrates")?;
        validate_nutrient(self.fat, "Fat")?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ExternalSearchParams {
    pub query: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

impl ExternalSearchParams {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.query.trim().chars().count() < 3 {
            return Err(ServiceError::Validation(
                "query must be at least 3 characters".into(),
            ));
        }
        if self.page < 1 {
            return Err(ServiceError::Validation("page must be at least 1".into()));
        }
        if !(1..=30).contains(&self.limit) {
            return Err(ServiceError::Validation(
                "limit must be between 1 and 30".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn valid_create() -> CreateRecipeRequest {
        serde_json::from_value(serde_json::json!({
            "title": "Garlic Pasta",
            "instructions": [
                {"stepNumber": 1, "instruction": "Boil the pasta."}
            ],
            "ingredients": [
                {"ingredientId": Uuid::new_v4(), "quantity": 2.0, "unit": "cloves"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn create_defaults_apply() {
        let req = valid_create();
        assert_eq!(req.servings, 4);
        assert_eq!(req.difficulty_level, "medium");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_rejects_short_title() {
        let mut req = valid_create();
        req.title = "ab".into();
        assert!(matches!(
            req.validate(),
            Err(ServiceError::Validation(msg)) if msg.contains("Title")
        ));
    }

    #[test]
    fn create_rejects_empty_and_short_instructions() {
        let mut req = valid_create();
        req.instructions.clear();
        assert!(req.validate().is_err());

        let mut req = valid_create();
        req.instructions[0].instruction = "stir".into();
        assert!(matches!(
            req.validate(),
            Err(ServiceError::Validation(msg)) if msg.contains("at least 5")
        ));
    }

    #[test]
    fn create_rejects_bad_ingredient_rows() {
        let mut req = valid_create();
        req.ingredients[0].quantity = 0.0;
        assert!(req.validate().is_err());

        let mut req = valid_create();
        req.ingredients[0].unit = "x".repeat(51);
        assert!(req.validate().is_err());

        let mut req = valid_create();
        req.ingredients.clear();
        assert!(matches!(
            req.validate(),
            Err(ServiceError::Validation(msg)) if msg.contains("ingredient")
        ));
    }

    #[test]
    fn update_validates_only_provided_fields() {
        let req = UpdateRecipeRequest::default();
        assert!(req.validate().is_ok());

        let req = UpdateRecipeRequest {
            title: Some("ab".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn search_params_enforce_bounds() {
        let ok = ExternalSearchParams {
            query: "pasta".into(),
            page: 1,
            limit: 30,
        };
        assert!(ok.validate().is_ok());

        let short = ExternalSearchParams {
            query: " s ".into(),
            page: 1,
            limit: 10,
        };
        assert!(matches!(
            short.validate(),
            Err(ServiceError::Validation(msg)) if msg.contains("3 characters")
        ));

        let wide = ExternalSearchParams {
            query: "pasta".into(),
            page: 1,
            limit: 31,
        };
        assert!(wide.validate().is_err());
    }

    #[test]
    fn recipe_response_serializes_camel_case() {
        let resp = RecipeResponse {
            id: Uuid::nil(),
            title: "Soup".into(),
            description: None,
            instructions: vec![InstructionStep {
                step_number: 1,
                instruction: "Simmer gently.".into(),
                estimated_time_minutes: Some(10),
            }],
            prep_time_minutes: Some(5),
            cook_time_minutes: None,
            servings: 2,
            difficulty_level: "medium".into(),
            cuisine_type: None,
            dietary_tags: vec!["vegan".into()],
            image_url: None,
            source_url: None,
            external_id: Some(99),
            calories: Some(120.0),
            protein: None,
            carbohydrates: None,
            fat: None,
            created_by_user_id: None,
            average_rating: 0.0,
            rating_count: 0,
            ingredients: vec![],
            created_at: datetime!(2024-01-15 10:30:00 UTC),
            updated_at: datetime!(2024-01-15 10:30:00 UTC),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["externalId"], 99);
        assert_eq!(json["dietaryTags"][0], "vegan");
        assert_eq!(json["instructions"][0]["stepNumber"], 1);
        assert_eq!(json["instructions"][0]["estimatedTimeMinutes"], 10);
        assert_eq!(json["createdAt"], "2024-01-15T10:30:00Z");
    }
}
