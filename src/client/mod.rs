//! Client-side mirror state.
//!
//! DESIGN
//! ======
//! Framework-free models of what a connected client keeps locally: the
//! conflict store driving "someone is editing" badges, and the optimistic
//! board view that re-renders a drag-drop immediately and reconciles (or
//! rolls back) against the server's answer. UI bindings stay out; these
//! are plain structs a rendering layer can wrap.

pub mod board;
pub mod conflict;
