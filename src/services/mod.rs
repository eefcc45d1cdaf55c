//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic so route handlers can stay focused
//! on protocol translation and transport plumbing.

pub mod position;
pub mod presence;
