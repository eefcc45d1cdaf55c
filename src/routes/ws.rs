//! WebSocket handler — session lifecycle and typed event dispatch.
//!
//! DESIGN
//! ======
//! On upgrade, the identity query parameter is checked against the team
//! roster (authentication proper lives with the CRUD service). Each
//! connection gets a session id and a bounded channel, then enters a
//! `select!` loop:
//! - Incoming client text → deserialize into `ClientEvent` + dispatch
//! - Broadcast events from peers → serialize + forward to the socket
//!
//! Malformed inbound payloads are logged and dropped; the connection
//! stays open. Availability over strict protocol enforcement.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register session → presence delta to everyone
//! 2. Client events → registry mutation → scoped broadcast
//! 3. Close → unregister → `field:stopped` per cleared claim →
//!    presence delta

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{ClientEvent, ServerEvent};
use crate::services;
use crate::state::AppState;

/// Outgoing channel capacity per session. Overflow drops frames for that
/// client only.
const SESSION_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(identity) = params.get("identity").cloned() else {
        return (StatusCode::UNAUTHORIZED, "identity required").into_response();
    };
    if !state.registry.read().await.roster().contains(&identity) {
        return (StatusCode::UNAUTHORIZED, "identity not on roster").into_response();
    }

    ws.on_upgrade(move |socket| run_ws(socket, state, identity))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, identity: String) {
    let session_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(SESSION_CHANNEL_CAPACITY);

    if let Err(e) = state
        .registry
        .write()
        .await
        .register(session_id, &identity, tx)
    {
        warn!(%session_id, error = %e, "ws: register failed");
        return;
    }
    info!(%session_id, %identity, "ws: client connected");

    // Everyone learns the identity is (still) online.
    services::presence::broadcast_delta(&state, &identity).await;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        handle_text(&state, session_id, &identity, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    cleanup(&state, session_id).await;
    info!(%session_id, %identity, "ws: client disconnected");
}

/// Unregister the session and broadcast what its departure changed:
/// a `field:stopped` per cleared edit claim, then a presence delta.
async fn cleanup(state: &AppState, session_id: Uuid) {
    let disconnected = {
        let mut registry = state.registry.write().await;
        registry.unregister(session_id)
    };
    let Some(disconnected) = disconnected else {
        return;
    };

    {
        let registry = state.registry.read().await;
        for (order_id, field_name) in &disconnected.cleared_edits {
            let event = ServerEvent::FieldStopped { order_id: *order_id, field_name: field_name.clone() };
            registry.broadcast_room(*order_id, &event, None);
        }
    }

    services::presence::broadcast_delta(state, &disconnected.identity).await;
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Deserialize one inbound text frame and dispatch it. Malformed payloads
/// are dropped without terminating the connection.
async fn handle_text(state: &AppState, session_id: Uuid, identity: &str, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%session_id, error = %e, "ws: malformed event dropped");
            return;
        }
    };

    match event {
        ClientEvent::JoinOrder { order_id } => {
            let joined = state.registry.write().await.join_order(session_id, order_id);
            if joined {
                info!(%session_id, %order_id, "ws: joined order room");
                services::presence::broadcast_delta(state, identity).await;
            }
        }
        ClientEvent::LeaveOrder { order_id } => {
            let left = state.registry.write().await.leave_order(session_id, order_id);
            if left {
                info!(%session_id, %order_id, "ws: left order room");
                services::presence::broadcast_delta(state, identity).await;
            }
        }
        ClientEvent::PresenceUpdate { current_order_id } => {
            if state.registry.write().await.set_viewed(session_id, current_order_id) {
                services::presence::broadcast_delta(state, identity).await;
            }
        }
        ClientEvent::TypingStart { order_id } => {
            let event = ServerEvent::TypingUpdate {
                order_id,
                identity: identity.to_owned(),
                is_typing: true,
            };
            room_broadcast(state, session_id, order_id, &event).await;
        }
        ClientEvent::TypingStop { order_id } => {
            let event = ServerEvent::TypingUpdate {
                order_id,
                identity: identity.to_owned(),
                is_typing: false,
            };
            room_broadcast(state, session_id, order_id, &event).await;
        }
        ClientEvent::CursorMove { order_id, user_name, position } => {
            let event = ServerEvent::CursorUpdate { order_id, user_name, position };
            room_broadcast(state, session_id, order_id, &event).await;
        }
        ClientEvent::FieldStart { order_id, field_name } => {
            let editor = state
                .registry
                .write()
                .await
                .start_edit(session_id, order_id, &field_name);
            if let Some(editor) = editor {
                let event = ServerEvent::FieldEditing { order_id, field_name, editor };
                state
                    .registry
                    .read()
                    .await
                    .broadcast_room(order_id, &event, Some(session_id));
            }
        }
        ClientEvent::FieldStop { order_id, field_name } => {
            let cleared = state
                .registry
                .write()
                .await
                .stop_edit(session_id, order_id, &field_name);
            if cleared {
                // Unconditional: the editor may have left the room already
                // (navigate away, then release), and peers still need their
                // lock badge cleared.
                let event = ServerEvent::FieldStopped { order_id, field_name };
                state
                    .registry
                    .read()
                    .await
                    .broadcast_room(order_id, &event, Some(session_id));
            }
        }
    }
}

/// Emit a room-scoped ephemeral event (typing, cursor) excluding the
/// sender. Silently ignored when the sender has not joined that order's
/// room. Field-edit events skip this guard: claims mutate and broadcast
/// regardless of the sender's current room.
async fn room_broadcast(state: &AppState, session_id: Uuid, order_id: Uuid, event: &ServerEvent) {
    let registry = state.registry.read().await;
    if !registry.in_room(session_id, order_id) {
        return;
    }
    registry.broadcast_room(order_id, event, Some(session_id));
}

// =============================================================================
// HELPERS
// =============================================================================

/// Forward one event to the socket. A serialization failure drops the
/// frame and keeps the session; only a socket send failure is fatal.
async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let Some(json) = encode_event(event) else {
        return Ok(());
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

fn encode_event(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event, frame dropped");
            None
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
