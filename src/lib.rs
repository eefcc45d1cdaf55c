//! Real-time collaboration core for a shared order/task tracker.
//!
//! ARCHITECTURE
//! ============
//! The crate tracks which participants are online and what they are
//! viewing or editing, fans those signals out over websockets, and keeps
//! Kanban column positions contiguous under concurrent drag-and-drop
//! moves. The surrounding CRUD service persists through the reorder
//! engine and triggers broadcasts through the registry; everything else
//! about it lives elsewhere.

pub mod client;
pub mod db;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod services;
pub mod state;
