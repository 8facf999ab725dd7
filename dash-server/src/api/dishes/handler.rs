use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::models::DishQuery;
use shared::{AppError, AppResult, Dish};

use crate::catalog::DishCatalog;
use crate::core::ServerState;

/// `GET /dishes?offset=&limit=`
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<DishQuery>,
) -> AppResult<Json<Vec<Dish>>> {
    let dishes = state.dishes.list(query.offset, query.limit()).await?;
    Ok(Json(dishes))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Dish>> {
    state
        .dishes
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::dish_not_found(id))
}
