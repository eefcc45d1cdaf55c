//! Move endpoints and presence queries.
//!
//! DESIGN
//! ======
//! The CRUD service calls these endpoints when a client drops a card; the
//! reorder engine mutates the authoritative positions and this layer
//! broadcasts the result to the owning order's room. Column keys and
//! positions are validated before any write; unknown ids are a 404 no-op.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::protocol::{Presence, ServerEvent, SubtaskSnapshot, TaskSnapshot};
use crate::services::position::{self, MoveError, SubtaskStatus, TaskStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveTaskBody {
    pub status: String,
    pub position: i32,
}

#[derive(Debug, Deserialize)]
pub struct MoveSubtaskBody {
    pub status: String,
    /// Omitted means "append at the end of the target column".
    pub position: Option<i32>,
}

/// `POST /api/tasks/:id/move` — authoritative task reorder.
pub async fn move_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    body: Result<Json<MoveTaskBody>, JsonRejection>,
) -> Result<Json<TaskSnapshot>, StatusCode> {
    // Any malformed body (bad JSON, missing or mistyped field) is a 400.
    let Json(body) = body.map_err(|_| StatusCode::BAD_REQUEST)?;
    let Some(status) = TaskStatus::parse(&body.status) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let task = position::move_task(&state.pool, task_id, status, Some(body.position))
        .await
        .map_err(move_error_to_status)?;

    let event = ServerEvent::TaskMoved { task: task.clone() };
    state
        .registry
        .read()
        .await
        .broadcast_room(task.order_id, &event, None);

    Ok(Json(task))
}

/// `POST /api/subtasks/:id/move` — authoritative subtask reorder.
pub async fn move_subtask(
    State(state): State<AppState>,
    Path(subtask_id): Path<Uuid>,
    body: Result<Json<MoveSubtaskBody>, JsonRejection>,
) -> Result<Json<SubtaskSnapshot>, StatusCode> {
    let Json(body) = body.map_err(|_| StatusCode::BAD_REQUEST)?;
    let Some(status) = SubtaskStatus::parse(&body.status) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let subtask = position::move_subtask(&state.pool, subtask_id, status, body.position)
        .await
        .map_err(move_error_to_status)?;

    let event = ServerEvent::SubtaskMoved { subtask: subtask.clone() };
    state
        .registry
        .read()
        .await
        .broadcast_room(subtask.order_id, &event, None);

    Ok(Json(subtask))
}

/// `GET /api/presence` — full presence snapshot across the roster.
pub async fn presence_snapshot(State(state): State<AppState>) -> Json<Vec<Presence>> {
    Json(state.registry.read().await.presence_snapshot())
}

/// `GET /api/orders/:id/viewers` — identities currently viewing an order.
pub async fn order_viewers(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Json<Vec<String>> {
    Json(state.registry.read().await.viewers(order_id))
}

pub(crate) fn move_error_to_status(err: MoveError) -> StatusCode {
    match err {
        MoveError::NotFound(_) => StatusCode::NOT_FOUND,
        MoveError::Validation(_) => StatusCode::BAD_REQUEST,
        MoveError::Database(e) => {
            tracing::error!(error = %e, "move transaction failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
