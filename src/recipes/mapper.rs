use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::recipes::dto::InstructionStep;
use crate::spoonacular::types::{RawIngredient, RawNutrition, RawRecipe};

lazy_static! {
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref URL_RE: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("Spoonacular data missing '{0}'.")]
    MissingField(String),
}

/// Canonical intermediate form of a provider recipe, ready for persistence.
/// Ingredients are carried by name here; ids are resolved later.
#[derive(Debug, Clone)]
pub struct MappedRecipe {
    pub external_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Vec<InstructionStep>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty_level: String,
    pub cuisine_type: Option<String>,
    pub dietary_tags: Vec<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
    pub ingredients: Vec<MappedIngredient>,
}

#[derive(Debug, Clone)]
pub struct MappedIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub preparation_note: Option<String>,
    pub category: Option<String>,
    pub calories_per_unit: Option<f64>,
}

/// Normalizes a raw provider recipe. Only a missing title is fatal; every
/// other omission degrades to null/empty, logged where it loses data.
pub fn map_provider_recipe(raw: &RawRecipe, external_id: i64) -> Result<MappedRecipe, MapError> {
    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MapError::MissingField("title".into()))?
        .to_string();

    let description = raw
        .summary
        .as_deref()
        .map(strip_html)
        .filter(|s| !s.is_empty());

    // Providers rarely separate prep from cook. When both are absent, the
    // combined ready time goes to cook time and prep stays null.
    let prep_time_minutes = raw.preparation_minutes;
    let cook_time_minutes = match (raw.preparation_minutes, raw.cooking_minutes) {
        (None, None) => raw.ready_in_minutes,
        (_, cook) => cook,
    };

    let cuisine_type = raw
        .cuisines
        .first()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let difficulty_level = raw
        .difficulty
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("medium")
        .to_string();

    let instructions = map_instructions(raw);
    if instructions.is_empty() {
        warn!(external_id, "No instructions mapped");
    }

    let mut ingredients = Vec::new();
    for item in &raw.extended_ingredients {
        if let Some(mapped) = map_ingredient(item) {
            ingredients.push(mapped);
        }
    }
    if ingredients.is_empty() {
        warn!(external_id, "No ingredients mapped");
    }

    let nutrients = TopNutrients::scan(raw.nutrition.as_ref());

    Ok(MappedRecipe {
        external_id,
        title,
        description,
        instructions,
        prep_time_minutes,
        cook_time_minutes,
        servings: raw.servings,
        difficulty_level,
        cuisine_type,
        dietary_tags: raw.diets.clone(),
        image_url: validate_url(raw.image.as_deref()),
        source_url: validate_url(raw.source_url.as_deref()),
        calories: nutrients.calories,
        protein: nutrients.protein,
        carbohydrates: nutrients.carbohydrates(),
        fat: nutrients.fat,
        ingredients,
    })
}

fn map_instructions(raw: &RawRecipe) -> Vec<InstructionStep> {
    let mut steps = Vec::new();
    for set in &raw.analyzed_instructions {
        for step in &set.steps {
            let number = step.number.filter(|n| *n >= 1);
            let text = step
                .step
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty());
            match (number, text) {
                (Some(number), Some(text)) => steps.push(InstructionStep {
                    step_number: number,
                    instruction: text.to_string(),
                    estimated_time_minutes: None,
                }),
                _ => warn!("Skipping invalid instruction step"),
            }
        }
    }

    if steps.is_empty() {
        if let Some(text) = raw
            .instructions
            .as_deref()
            .map(strip_html)
            .filter(|t| !t.is_empty())
        {
            info!("No structured instructions, falling back to plain text");
            steps.push(InstructionStep {
                step_number: 1,
                instruction: text,
                estimated_time_minutes: None,
            });
        }
    }
    steps
}

fn map_ingredient(item: &RawIngredient) -> Option<MappedIngredient> {
    let display_name = item
        .name_clean
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| {
            item.name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
        });
    let Some(display_name) = display_name else {
        warn!("Skipping ingredient with no name");
        return None;
    };

    let quantity = item.amount.filter(|a| *a != 0.0);
    let unit = item
        .unit
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let (Some(quantity), Some(unit)) = (quantity, unit) else {
        warn!("Skipping ingredient '{display_name}' due to missing quantity or unit");
        return None;
    };

    let preparation_note = item
        .original
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| {
            item.original_string
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
        })
        .map(String::from)
        .or_else(|| {
            if item.meta.is_empty() {
                None
            } else {
                Some(item.meta.join("; "))
            }
        });

    let category = item
        .aisle
        .as_deref()
        .and_then(|a| a.split(';').next())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from);

    let name = display_name.to_lowercase();
    let calories_per_unit = ingredient_calories(item, quantity, unit, &name);

    Some(MappedIngredient {
        name,
        quantity,
        unit: unit.to_string(),
        preparation_note,
        category,
        calories_per_unit,
    })
}

/// Per-unit calories are only trustworthy when the reported quantity is
/// exactly one unit; deriving a ratio from other quantities is not supported
/// by the source data.
fn ingredient_calories(
    item: &RawIngredient,
    quantity: f64,
    unit: &str,
    name: &str,
) -> Option<f64> {
    let amount = item
        .nutrition
        .as_ref()?
        .nutrients
        .iter()
        .find(|n| {
            n.name
                .as_deref()
                .is_some_and(|x| x.eq_ignore_ascii_case("calories"))
        })?
        .amount?;

    if quantity == 1.0 {
        Some(amount)
    } else {
        info!(
            "Ingredient '{name}': Calorie data present for quantity {quantity} {unit} \
             but not directly per single unit."
        );
        None
    }
}

#[derive(Default)]
struct TopNutrients {
    calories: Option<f64>,
    protein: Option<f64>,
    fat: Option<f64>,
    carbs_primary: Option<f64>,
    carbs_net: Option<f64>,
}

impl TopNutrients {
    fn scan(nutrition: Option<&RawNutrition>) -> Self {
        let mut out = Self::default();
        let Some(nutrition) = nutrition else {
            return out;
        };
        for n in &nutrition.nutrients {
            let Some(name) = n.name.as_deref() else {
                continue;
            };
            match name.to_lowercase().as_str() {
                "calories" => out.calories = out.calories.or(n.amount),
                "protein" => out.protein = out.protein.or(n.amount),
                "fat" => out.fat = out.fat.or(n.amount),
                "carbohydrates" => out.carbs_primary = out.carbs_primary.or(n.amount),
                "net carbohydrates" => out.carbs_net = out.carbs_net.or(n.amount),
                _ => {}
            }
        }
        out
    }

    fn carbohydrates(&self) -> Option<f64> {
        self.carbs_primary.or(self.carbs_net)
    }
}

fn strip_html(text: &str) -> String {
    let without_tags = HTML_TAG_RE.replace_all(text, "");
    let decoded = without_tags
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    WHITESPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

fn validate_url(candidate: Option<&str>) -> Option<String> {
    candidate
        .map(str::trim)
        .filter(|c| URL_RE.is_match(c))
        .map(String::from)
}
