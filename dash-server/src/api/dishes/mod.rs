//! Dish catalog API (public, read-only)

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/dishes", get(handler::list))
        .route("/dishes/{id}", get(handler::get_by_id))
}
