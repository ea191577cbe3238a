use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::common::{ListParams, PageMeta, Paginated};
use crate::error::ServiceError;
use crate::meal_plans::dto::{
    AddEntryRequest, CreateMealPlanRequest, MealPlanDetailResponse, MealPlanEntryResponse,
    MealPlanResponse, UpdateMealPlanRequest,
};
use crate::meal_plans::repo::{self, MealPlan};
use crate::recipes::services::RecipeCatalog;
use crate::state::AppState;
use crate::users::ActingUser;

pub fn router() -> Router<AppState> {
    read_router().merge(write_router())
}

fn read_router() -> Router<AppState> {
    Router::new()
        .route("/meal-plans", get(list_meal_plans))
        .route("/meal-plans/:id", get(get_meal_plan))
}

fn write_router() -> Router<AppState> {
    Router::new()
        .route("/meal-plans", post(create_meal_plan))
        .route(
            "/meal-plans/:id",
            put(update_meal_plan).delete(delete_meal_plan),
        )
        .route("/meal-plans/:id/recipes", post(add_entry))
        .route("/meal-plans/:id/recipes/:entry_id", delete(remove_entry))
}

/// Plans are private to their owner. Existence is checked before ownership
/// so a missing plan is a 404, never a 403.
async fn owned_plan(
    db: &PgPool,
    id: Uuid,
    user: Uuid,
    action: &str,
) -> Result<MealPlan, ServiceError> {
    let plan = repo::find_by_id(db, id)
        .await
        .map_err(ServiceError::internal)?
        .ok_or_else(|| ServiceError::NotFound("Meal plan not found".into()))?;
    if plan.user_id != user {
        return Err(ServiceError::Forbidden(format!(
            "Not authorized to {action} this meal plan"
        )));
    }
    Ok(plan)
}

#[instrument(skip(state))]
async fn list_meal_plans(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<MealPlanResponse>>, ServiceError> {
    params.validate()?;
    let plans = repo::list_for_user(&state.db, user, params.limit, params.offset())
        .await
        .map_err(ServiceError::internal)?;
    let total = repo::count_for_user(&state.db, user)
        .await
        .map_err(ServiceError::internal)?;
    let data = plans.into_iter().map(MealPlanResponse::from).collect();
    Ok(Json(Paginated::new(
        data,
        PageMeta::new(params.page, params.limit, total),
    )))
}

#[instrument(skip(state))]
async fn get_meal_plan(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealPlanDetailResponse>, ServiceError> {
    let plan = owned_plan(&state.db, id, user, "view").await?;
    let entries = repo::entries_for(&state.db, id)
        .await
        .map_err(ServiceError::internal)?;
    Ok(Json(MealPlanDetailResponse {
        plan: plan.into(),
        entries: entries.into_iter().map(MealPlanEntryResponse::from).collect(),
    }))
}

#[instrument(skip(state, payload))]
async fn create_meal_plan(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(payload): Json<CreateMealPlanRequest>,
) -> Result<(StatusCode, Json<MealPlanResponse>), ServiceError> {
    payload.validate()?;
    let plan = repo::create(
        &state.db,
        user,
        &payload.title,
        payload.start_date,
        payload.end_date,
        payload.target_calories,
    )
    .await
    .map_err(ServiceError::internal)?;
    Ok((StatusCode::CREATED, Json(plan.into())))
}

#[instrument(skip(state, payload))]
async fn update_meal_plan(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMealPlanRequest>,
) -> Result<Json<MealPlanResponse>, ServiceError> {
    payload.validate()?;
    owned_plan(&state.db, id, user, "update").await?;
    let plan = repo::update(
        &state.db,
        id,
        payload.title.as_deref(),
        payload.start_date,
        payload.end_date,
        payload.target_calories,
    )
    .await
    .map_err(ServiceError::internal)?
    .ok_or_else(|| ServiceError::NotFound("Meal plan not found".into()))?;
    Ok(Json(plan.into()))
}

#[instrument(skip(state))]
async fn delete_meal_plan(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    owned_plan(&state.db, id, user, "delete").await?;
    repo::delete(&state.db, id)
        .await
        .map_err(ServiceError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
async fn add_entry(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<MealPlanEntryResponse>), ServiceError> {
    payload.validate()?;
    owned_plan(&state.db, id, user, "modify").await?;
    // The referenced recipe must exist before the entry is linked.
    RecipeCatalog::from_state(&state).get(payload.recipe_id).await?;
    let entry = repo::add_entry(
        &state.db,
        id,
        payload.recipe_id,
        payload.meal_date,
        &payload.meal_type,
        payload.servings,
        payload.position_order,
    )
    .await
    .map_err(ServiceError::internal)?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

#[instrument(skip(state))]
async fn remove_entry(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    owned_plan(&state.db, id, user, "modify").await?;
    let entry = repo::find_entry(&state.db, id, entry_id)
        .await
        .map_err(ServiceError::internal)?
        .ok_or_else(|| ServiceError::NotFound("Meal plan entry not found".into()))?;
    repo::delete_entry(&state.db, entry.id)
        .await
        .map_err(ServiceError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}
