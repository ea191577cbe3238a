//! Wire types for the Spoonacular API. Every field is optional or defaulted:
//! the upstream payloads are inconsistent between endpoints and plans, and a
//! missing field must surface as a mapping decision, not a decode failure.

use serde::Deserialize;

/// Full recipe payload from `GET /recipes/{id}/information`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRecipe {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub source_url: Option<String>,
    pub preparation_minutes: Option<i32>,
    pub cooking_minutes: Option<i32>,
    pub ready_in_minutes: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Option<String>,
    pub cuisines: Vec<String>,
    pub diets: Vec<String>,
    pub instructions: Option<String>,
    pub analyzed_instructions: Vec<RawInstructionSet>,
    pub extended_ingredients: Vec<RawIngredient>,
    pub nutrition: Option<RawNutrition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawInstructionSet {
    pub name: Option<String>,
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStep {
    pub number: Option<i32>,
    pub step: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawIngredient {
    pub name_clean: Option<String>,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub unit: Option<String>,
    pub original: Option<String>,
    pub original_string: Option<String>,
    pub meta: Vec<String>,
    pub aisle: Option<String>,
    pub nutrition: Option<RawNutrition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawNutrition {
    pub nutrients: Vec<RawNutrient>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawNutrient {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub unit: Option<String>,
}

/// Response of `GET /recipes/complexSearch`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSearchResponse {
    pub results: Vec<RawSearchHit>,
    pub offset: Option<i64>,
    pub number: Option<i64>,
    pub total_results: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSearchHit {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub image: Option<String>,
    pub source_url: Option<String>,
    pub ready_in_minutes: Option<i32>,
    pub servings: Option<i32>,
}
