//! Wire protocol — the closed set of websocket events.
//!
//! DESIGN
//! ======
//! Every message crossing the socket is one of these tagged variants.
//! Inbound text is deserialized into `ClientEvent` at the transport
//! boundary; handlers never see raw JSON. Malformed payloads fail to
//! deserialize and are dropped by the ws loop, keeping the connection
//! alive.
//!
//! Event names use the `scope:action` form (`join:order`, `field:start`).
//! The serde tag is `event`, the payload rides under `data`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Events a connected client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Subscribe to an order room. Implicitly leaves the previous room.
    #[serde(rename = "join:order")]
    JoinOrder { order_id: Uuid },
    /// Unsubscribe from an order room.
    #[serde(rename = "leave:order")]
    LeaveOrder { order_id: Uuid },
    #[serde(rename = "typing:start")]
    TypingStart { order_id: Uuid },
    #[serde(rename = "typing:stop")]
    TypingStop { order_id: Uuid },
    #[serde(rename = "cursor:move")]
    CursorMove {
        order_id: Uuid,
        user_name: String,
        position: i64,
    },
    /// Explicit viewed-order change (dashboard and list views send `None`).
    #[serde(rename = "presence:update")]
    PresenceUpdate { current_order_id: Option<Uuid> },
    /// Advisory start-of-edit on one field of an order.
    #[serde(rename = "field:start")]
    FieldStart { order_id: Uuid, field_name: String },
    #[serde(rename = "field:stop")]
    FieldStop { order_id: Uuid, field_name: String },
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// Derived per-participant presence. Folded from live sessions, never
/// stored as ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub identity: String,
    pub is_online: bool,
    pub current_order_id: Option<Uuid>,
    /// Milliseconds since Unix epoch of the last session transition.
    /// `None` if the participant has never connected in this process.
    pub last_activity: Option<i64>,
}

/// A task row as broadcast after a move. Mirrors the `tasks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub order_id: Uuid,
    pub title: String,
    pub status: String,
    pub position: i32,
}

/// A subtask row as broadcast after a move. Mirrors the `subtasks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskSnapshot {
    pub id: Uuid,
    pub task_id: Uuid,
    pub order_id: Uuid,
    pub title: String,
    pub status: String,
    pub position: i32,
}

/// Events the server emits. Order/comment/reaction payloads originate in
/// the CRUD layer and are carried opaquely; everything the collaboration
/// core itself produces is fully typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    // Global events — every connected session receives these.
    #[serde(rename = "order:created")]
    OrderCreated { order: serde_json::Value },
    #[serde(rename = "order:updated")]
    OrderUpdated { order: serde_json::Value },
    #[serde(rename = "order:deleted")]
    OrderDeleted { order_id: Uuid },
    #[serde(rename = "presence:updated")]
    PresenceUpdated { presence: Presence },

    // Room-scoped events — only sessions joined to the order receive these.
    #[serde(rename = "task:moved")]
    TaskMoved { task: TaskSnapshot },
    #[serde(rename = "subtask:created")]
    SubtaskCreated { subtask: serde_json::Value },
    #[serde(rename = "subtask:updated")]
    SubtaskUpdated { subtask: serde_json::Value },
    #[serde(rename = "subtask:moved")]
    SubtaskMoved { subtask: SubtaskSnapshot },
    #[serde(rename = "subtask:deleted")]
    SubtaskDeleted { subtask_id: Uuid },
    #[serde(rename = "comment:created")]
    CommentCreated { order_id: Uuid, comment: serde_json::Value },
    #[serde(rename = "comment:updated")]
    CommentUpdated { order_id: Uuid, comment: serde_json::Value },
    #[serde(rename = "comment:deleted")]
    CommentDeleted { order_id: Uuid, comment_id: Uuid },
    #[serde(rename = "reaction:toggled")]
    ReactionToggled { order_id: Uuid, reaction: serde_json::Value },
    #[serde(rename = "typing:update")]
    TypingUpdate {
        order_id: Uuid,
        identity: String,
        is_typing: bool,
    },
    #[serde(rename = "cursor:update")]
    CursorUpdate {
        order_id: Uuid,
        user_name: String,
        position: i64,
    },
    #[serde(rename = "field:editing")]
    FieldEditing {
        order_id: Uuid,
        field_name: String,
        editor: String,
    },
    #[serde(rename = "field:stopped")]
    FieldStopped { order_id: Uuid, field_name: String },
}

// =============================================================================
// TESTS
// =============================================================================
