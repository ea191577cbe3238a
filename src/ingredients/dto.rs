use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ingredients::repo::Ingredient;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientResponse {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub calories_per_unit: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Ingredient> for IngredientResponse {
    fn from(i: Ingredient) -> Self {
        Self {
            id: i.id,
            name: i.name,
            category: i.category,
            calories_per_unit: i.calories_per_unit,
            created_at: i.created_at,
        }
    }
}
