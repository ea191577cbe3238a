use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::common::{ListParams, Paginated};
use crate::error::ServiceError;
use crate::recipes::dto::{
    CreateRecipeRequest, ExternalRecipeSummary, ExternalSearchParams, RecipeResponse,
    UpdateRecipeRequest,
};
use crate::recipes::services::RecipeCatalog;
use crate::state::AppState;
use crate::users::ActingUser;

pub fn router() -> Router<AppState> {
    read_router().merge(write_router())
}

fn read_router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/search-external", get(search_external))
        .route("/recipes/:id", get(get_recipe))
}

fn write_router() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route(
            "/recipes/import-external/:external_id",
            post(import_external),
        )
        .route("/recipes/:id", put(update_recipe).delete(delete_recipe))
}

#[instrument(skip(state))]
async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<RecipeResponse>>, ServiceError> {
    params.validate()?;
    let catalog = RecipeCatalog::from_state(&state);
    let (items, meta) = catalog.list(params.page, params.limit).await?;
    let data = items.into_iter().map(RecipeResponse::from).collect();
    Ok(Json(Paginated::new(data, meta)))
}

#[instrument(skip(state))]
async fn search_external(
    State(state): State<AppState>,
    Query(params): Query<ExternalSearchParams>,
) -> Result<Json<Paginated<ExternalRecipeSummary>>, ServiceError> {
    params.validate()?;
    let catalog = RecipeCatalog::from_state(&state);
    let (results, meta) = catalog
        .search_external(params.query.trim(), params.page, params.limit)
        .await?;
    Ok(Json(Paginated::new(results, meta)))
}

#[instrument(skip(state))]
async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeResponse>, ServiceError> {
    let catalog = RecipeCatalog::from_state(&state);
    Ok(Json(catalog.get(id).await?.into()))
}

#[instrument(skip(state, payload))]
async fn create_recipe(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(payload): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeResponse>), ServiceError> {
    let catalog = RecipeCatalog::from_state(&state);
    let created = catalog.create(&payload, user).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[instrument(skip(state))]
async fn import_external(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(external_id): Path<i64>,
) -> Result<Json<RecipeResponse>, ServiceError> {
    if external_id < 1 {
        return Err(ServiceError::Validation(
            "externalId must be a positive integer".into(),
        ));
    }
    let catalog = RecipeCatalog::from_state(&state);
    let recipe = catalog
        .import_by_external_id(external_id, user)
        .await
        .map_err(|e| not_found_on_provider(external_id, e))?;
    Ok(Json(recipe.into()))
}

#[instrument(skip(state, payload))]
async fn update_recipe(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> Result<Json<RecipeResponse>, ServiceError> {
    let catalog = RecipeCatalog::from_state(&state);
    let updated = catalog.update(id, &payload, user).await?;
    Ok(Json(updated.into()))
}

#[instrument(skip(state))]
async fn delete_recipe(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    let catalog = RecipeCatalog::from_state(&state);
    catalog.delete(id, user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A provider 404 on import means the external id does not exist; surface
/// that as a local not-found with a stable message.
fn not_found_on_provider(external_id: i64, e: ServiceError) -> ServiceError {
    match e {
        ServiceError::Provider { status, message }
            if status == Some(404) || message.to_lowercase().contains("not found") =>
        {
            ServiceError::NotFound(format!("Recipe {external_id} not found on Spoonacular."))
        }
        other => other,
    }
}
