use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::common::{ListParams, PageMeta, Paginated};
use crate::error::ServiceError;
use crate::ingredients::dto::IngredientResponse;
use crate::ingredients::repo;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
}

#[instrument(skip(state))]
async fn list_ingredients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<IngredientResponse>>, ServiceError> {
    params.validate()?;
    let items = repo::list(&state.db, params.limit, params.offset())
        .await
        .map_err(ServiceError::internal)?;
    let total = repo::count(&state.db)
        .await
        .map_err(ServiceError::internal)?;
    let data = items.into_iter().map(IngredientResponse::from).collect();
    Ok(Json(Paginated::new(
        data,
        PageMeta::new(params.page, params.limit, total),
    )))
}

#[instrument(skip(state))]
async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IngredientResponse>, ServiceError> {
    let ingredient = repo::find_by_id(&state.db, id)
        .await
        .map_err(ServiceError::internal)?
        .ok_or_else(|| ServiceError::NotFound("Ingredient not found".into()))?;
    Ok(Json(ingredient.into()))
}
