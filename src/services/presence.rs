//! Presence broadcaster — global online/viewing deltas.
//!
//! DESIGN
//! ======
//! Presence is a cross-order signal: list and dashboard views need it as
//! much as detail views, so deltas go to every connected session, not to
//! a room. Delivery is best-effort with no acknowledgement; a client that
//! misses a delta during a reconnect window resynchronizes from the
//! snapshot endpoint or self-heals on the next delta.

use crate::protocol::ServerEvent;
use crate::state::AppState;

/// Fold the identity's live sessions into a presence delta and emit it to
/// all connected sessions. Called on every session lifecycle transition:
/// connect, disconnect, join, leave, and explicit viewed-order change.
pub async fn broadcast_delta(state: &AppState, identity: &str) {
    let registry = state.registry.read().await;
    let presence = registry.presence_for(identity);
    registry.broadcast_all(&ServerEvent::PresenceUpdated { presence }, None);
}
