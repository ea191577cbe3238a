use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::meal_plans::repo::{MealPlan, MealPlanEntry};

pub const MEAL_TYPES: [&str; 4] = ["breakfast", "lunch", "dinner", "snack"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealPlanRequest {
    pub title: String,
    pub start_date: Date,
    pub end_date: Date,
    #[serde(default)]
    pub target_calories: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMealPlanRequest {
    pub title: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub target_calories: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEntryRequest {
    pub recipe_id: Uuid,
    pub meal_date: Date,
    pub meal_type: String,
    #[serde(default = "default_servings")]
    pub servings: i32,
    #[serde(default)]
    pub position_order: i32,
}

fn default_servings() -> i32 {
    1
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
    let len = title.trim().chars().count();
    if !(1..=255).contains(&len) {
        return Err(ServiceError::Validation(
            "Title must be between 1 and 255 characters".into(),
        ));
    }
    Ok(())
}

fn validate_date_range(start: Date, end: Date) -> Result<(), ServiceError> {
    if end < start {
        return Err(ServiceError::Validation(
            "endDate must not be before startDate".into(),
        ));
    }
    Ok(())
}

fn validate_target_calories(target: Option<i32>) -> Result<(), ServiceError> {
    if target.is_some_and(|t| t < 0) {
        return Err(ServiceError::Validation(
            "targetCalories must not be negative".into(),
        ));
    }
    Ok(())
}

impl CreateMealPlanRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_title(&self.title)?;
        validate_date_range(self.start_date, self.end_date)?;
        validate_target_calories(self.target_calories)
    }
}

impl UpdateMealPlanRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            validate_date_range(start, end)?;
        }
        validate_target_calories(self.target_calories)
    }
}

impl AddEntryRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if !MEAL_TYPES.contains(&self.meal_type.as_str()) {
            return Err(ServiceError::Validation(
                "mealType must be one of breakfast, lunch, dinner, snack".into(),
            ));
        }
        if self.servings < 1 {
            return Err(ServiceError::Validation(
                "Servings must be at least 1".into(),
            ));
        }
        if self.position_order < 0 {
            return Err(ServiceError::Validation(
                "positionOrder must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub start_date: Date,
    pub end_date: Date,
    pub target_calories: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<MealPlan> for MealPlanResponse {
    fn from(p: MealPlan) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            title: p.title,
            start_date: p.start_date,
            end_date: p.end_date,
            target_calories: p.target_calories,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanEntryResponse {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub meal_date: Date,
    pub meal_type: String,
    pub servings: i32,
    pub position_order: i32,
}

impl From<MealPlanEntry> for MealPlanEntryResponse {
    fn from(e: MealPlanEntry) -> Self {
        Self {
            id: e.id,
            recipe_id: e.recipe_id,
            meal_date: e.meal_date,
            meal_type: e.meal_type,
            servings: e.servings,
            position_order: e.position_order,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanDetailResponse {
    #[serde(flatten)]
    pub plan: MealPlanResponse,
    pub entries: Vec<MealPlanEntryResponse>,
}
