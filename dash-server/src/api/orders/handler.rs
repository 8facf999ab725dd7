//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shared::models::{CreateOrderRequest, OrderQuery, UpdateStatusRequest};
use shared::{AppResult, Order};

use crate::api::ValidatedJson;
use crate::auth::CurrentSession;
use crate::core::ServerState;
use crate::orders::Committed;

/// Whether the order event reached the broker
pub const PROPAGATION_HEADER: &str = "x-order-propagation";

fn committed_response(status: StatusCode, committed: Committed) -> Response {
    (
        status,
        [(PROPAGATION_HEADER, committed.propagation.as_str())],
        Json(committed.order),
    )
        .into_response()
}

/// Checkout
pub async fn create(
    State(state): State<ServerState>,
    session: CurrentSession,
    ValidatedJson(req): ValidatedJson<CreateOrderRequest>,
) -> AppResult<Response> {
    let committed = state
        .orders
        .create_order(&session, req.items, req.order_type)
        .await?;
    Ok(committed_response(StatusCode::CREATED, committed))
}

pub async fn update_status(
    State(state): State<ServerState>,
    _session: CurrentSession,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> AppResult<Response> {
    let committed = state.orders.update_order_status(&id, req.status).await?;
    Ok(committed_response(StatusCode::OK, committed))
}

pub async fn list(
    State(state): State<ServerState>,
    _session: CurrentSession,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.list_orders(&query).await?))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    _session: CurrentSession,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.get_order(&id).await?))
}
