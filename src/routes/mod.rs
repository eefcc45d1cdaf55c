//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the websocket endpoint, the move endpoints, and the presence
//! queries under a single Axum router. The wider CRUD surface lives in a
//! separate service and consumes this one.

pub mod moves;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/tasks/{id}/move", post(moves::move_task))
        .route("/api/subtasks/{id}/move", post(moves::move_subtask))
        .route("/api/presence", get(moves::presence_snapshot))
        .route("/api/orders/{id}/viewers", get(moves::order_viewers))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
