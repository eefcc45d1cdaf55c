//! Connection registry — live sessions, order rooms, and field-edit claims.
//!
//! DESIGN
//! ======
//! The registry is constructed once in `main` and owned by `AppState`
//! behind an `RwLock`; handlers receive it through the Axum `State`
//! extractor, never as ambient module state. Each websocket event is
//! handled to completion before the next is dequeued, so mutations of the
//! session table, room sets, and field-edit claims are atomic relative to
//! each other within one process.
//!
//! Presence is derived: `is_online` is a fold over live sessions for an
//! identity, never an independently stored flag. Multiple sessions (tabs,
//! devices) may share one identity.
//!
//! BROADCAST
//! =========
//! Fan-out is `try_send` on each session's bounded channel. Best-effort: a
//! full channel drops the frame for that recipient, and nothing is retried
//! or rolled back. There is no event replay; a late joiner sees only
//! future deltas.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{Presence, ServerEvent};

// =============================================================================
// ROSTER
// =============================================================================

const DEFAULT_ROSTER: &str = "alice,bob,carol,dave";

/// The fixed set of named participants. Loaded from `TEAM_ROSTER`
/// (comma-separated) at startup; identities outside the roster are
/// rejected at websocket upgrade.
#[derive(Debug, Clone)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let names = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self { names }
    }

    #[must_use]
    pub fn from_env() -> Self {
        let raw = std::env::var("TEAM_ROSTER").unwrap_or_else(|_| DEFAULT_ROSTER.into());
        Self::parse(&raw)
    }

    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.names.iter().any(|n| n == identity)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("identity not on roster: {0}")]
    UnknownIdentity(String),
    #[error("unknown session: {0}")]
    UnknownSession(Uuid),
}

/// One live websocket connection.
struct Session {
    identity: String,
    /// Order room this session is joined to, at most one at a time.
    room: Option<Uuid>,
    /// Presence-visible viewed order. Usually mirrors `room`, but
    /// `presence:update` can set it independently (dashboard views).
    viewed_order: Option<Uuid>,
    tx: mpsc::Sender<ServerEvent>,
}

/// Result of removing a session, used by the ws handler to drive
/// disconnect broadcasts.
#[derive(Debug)]
pub struct Disconnected {
    pub identity: String,
    /// True if this was the identity's last live session.
    pub went_offline: bool,
    /// Field-edit claims cleared by this disconnect, as (order, field).
    pub cleared_edits: Vec<(Uuid, String)>,
}

/// Live sessions, order rooms, and advisory field-edit claims.
pub struct Registry {
    roster: Roster,
    sessions: HashMap<Uuid, Session>,
    /// Order room membership: order id -> session ids currently joined.
    rooms: HashMap<Uuid, HashSet<Uuid>>,
    /// At most one claim per (order, field). Last start wins.
    field_edits: HashMap<(Uuid, String), String>,
    /// Last session transition per identity, unix millis. Survives
    /// disconnects for the lifetime of the process.
    last_activity: HashMap<String, i64>,
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// SESSION LIFECYCLE
// =============================================================================

impl Registry {
    #[must_use]
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            sessions: HashMap::new(),
            rooms: HashMap::new(),
            field_edits: HashMap::new(),
            last_activity: HashMap::new(),
        }
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Register a new session for a roster identity.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIdentity` if the identity is not on the roster.
    pub fn register(
        &mut self,
        session_id: Uuid,
        identity: &str,
        tx: mpsc::Sender<ServerEvent>,
    ) -> Result<(), RegistryError> {
        if !self.roster.contains(identity) {
            return Err(RegistryError::UnknownIdentity(identity.to_owned()));
        }
        self.sessions.insert(
            session_id,
            Session { identity: identity.to_owned(), room: None, viewed_order: None, tx },
        );
        self.touch(identity);
        Ok(())
    }

    /// Remove a session. Clears every field-edit claim owned by the
    /// session's identity so no stale "someone is editing" indicator
    /// outlives the connection.
    pub fn unregister(&mut self, session_id: Uuid) -> Option<Disconnected> {
        let session = self.sessions.remove(&session_id)?;
        if let Some(order_id) = session.room {
            self.remove_from_room(order_id, session_id);
        }

        let identity = session.identity;
        let went_offline = !self.sessions.values().any(|s| s.identity == identity);

        let mut cleared_edits: Vec<(Uuid, String)> = self
            .field_edits
            .iter()
            .filter(|(_, editor)| **editor == identity)
            .map(|(key, _)| key.clone())
            .collect();
        cleared_edits.sort();
        for key in &cleared_edits {
            self.field_edits.remove(key);
        }

        self.touch(&identity);
        Some(Disconnected { identity, went_offline, cleared_edits })
    }

    /// Join an order room, implicitly leaving any previous room.
    /// Returns false for an unknown session.
    pub fn join_order(&mut self, session_id: Uuid, order_id: Uuid) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        let identity = session.identity.clone();
        let previous = session.room.replace(order_id);
        session.viewed_order = Some(order_id);

        if let Some(prev) = previous {
            if prev != order_id {
                self.remove_from_room(prev, session_id);
            }
        }
        self.rooms.entry(order_id).or_default().insert(session_id);
        self.touch(&identity);
        true
    }

    /// Leave an order room. A no-op unless the session is currently
    /// joined to that order.
    pub fn leave_order(&mut self, session_id: Uuid, order_id: Uuid) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        if session.room != Some(order_id) {
            return false;
        }
        session.room = None;
        session.viewed_order = None;
        let identity = session.identity.clone();
        self.remove_from_room(order_id, session_id);
        self.touch(&identity);
        true
    }

    /// Explicit viewed-order change from `presence:update`. Adjusts the
    /// presence-visible order only; room membership is driven solely by
    /// `join:order` / `leave:order`.
    pub fn set_viewed(&mut self, session_id: Uuid, current_order_id: Option<Uuid>) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        session.viewed_order = current_order_id;
        let identity = session.identity.clone();
        self.touch(&identity);
        true
    }

    fn remove_from_room(&mut self, order_id: Uuid, session_id: Uuid) {
        if let Some(room) = self.rooms.get_mut(&order_id) {
            room.remove(&session_id);
            if room.is_empty() {
                self.rooms.remove(&order_id);
            }
        }
    }

    fn touch(&mut self, identity: &str) {
        self.last_activity.insert(identity.to_owned(), now_ms());
    }
}

// =============================================================================
// FIELD-EDIT CLAIMS
// =============================================================================

impl Registry {
    /// Claim a field for the session's identity. Last start wins: any
    /// prior owner is overwritten without notice. This is conflict
    /// detection, not a lock.
    ///
    /// Returns the claiming identity for broadcast, or `None` for an
    /// unknown session.
    pub fn start_edit(&mut self, session_id: Uuid, order_id: Uuid, field_name: &str) -> Option<String> {
        let identity = self.sessions.get(&session_id)?.identity.clone();
        self.field_edits
            .insert((order_id, field_name.to_owned()), identity.clone());
        self.touch(&identity);
        Some(identity)
    }

    /// Release a field claim, but only if the caller's identity still
    /// owns it. A stale stop from an overwritten editor is a no-op.
    pub fn stop_edit(&mut self, session_id: Uuid, order_id: Uuid, field_name: &str) -> bool {
        let Some(session) = self.sessions.get(&session_id) else {
            return false;
        };
        let identity = session.identity.clone();
        let key = (order_id, field_name.to_owned());
        match self.field_edits.get(&key) {
            Some(owner) if *owner == identity => {
                self.field_edits.remove(&key);
                self.touch(&identity);
                true
            }
            _ => false,
        }
    }

    /// Current editor of a field, if any.
    #[must_use]
    pub fn field_editor(&self, order_id: Uuid, field_name: &str) -> Option<&str> {
        self.field_edits
            .get(&(order_id, field_name.to_owned()))
            .map(String::as_str)
    }
}

// =============================================================================
// PRESENCE FOLD
// =============================================================================

impl Registry {
    /// Derive presence for one identity by folding its live sessions.
    #[must_use]
    pub fn presence_for(&self, identity: &str) -> Presence {
        let mut is_online = false;
        let mut current_order_id = None;
        for session in self.sessions.values().filter(|s| s.identity == identity) {
            is_online = true;
            if current_order_id.is_none() {
                current_order_id = session.viewed_order;
            }
        }
        Presence {
            identity: identity.to_owned(),
            is_online,
            current_order_id,
            last_activity: self.last_activity.get(identity).copied(),
        }
    }

    /// Full snapshot across the roster, offline members included.
    #[must_use]
    pub fn presence_snapshot(&self) -> Vec<Presence> {
        self.roster
            .names()
            .iter()
            .map(|name| self.presence_for(name))
            .collect()
    }

    /// Identities currently joined to an order's room, deduplicated.
    #[must_use]
    pub fn viewers(&self, order_id: Uuid) -> Vec<String> {
        let Some(room) = self.rooms.get(&order_id) else {
            return Vec::new();
        };
        let mut identities: Vec<String> = room
            .iter()
            .filter_map(|sid| self.sessions.get(sid))
            .map(|s| s.identity.clone())
            .collect();
        identities.sort();
        identities.dedup();
        identities
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

impl Registry {
    /// Send an event to every connected session, optionally excluding one.
    pub fn broadcast_all(&self, event: &ServerEvent, exclude: Option<Uuid>) {
        for (session_id, session) in &self.sessions {
            if exclude == Some(*session_id) {
                continue;
            }
            // Best-effort: a full channel drops the frame for this client.
            let _ = session.tx.try_send(event.clone());
        }
    }

    /// Send an event to the sessions joined to an order, optionally
    /// excluding one. No-op if the room does not exist.
    pub fn broadcast_room(&self, order_id: Uuid, event: &ServerEvent, exclude: Option<Uuid>) {
        let Some(room) = self.rooms.get(&order_id) else {
            return;
        };
        for session_id in room {
            if exclude == Some(*session_id) {
                continue;
            }
            let Some(session) = self.sessions.get(session_id) else {
                continue;
            };
            let _ = session.tx.try_send(event.clone());
        }
    }

    /// Whether a session is currently joined to an order's room.
    #[must_use]
    pub fn in_room(&self, session_id: Uuid, order_id: Uuid) -> bool {
        self.rooms
            .get(&order_id)
            .is_some_and(|room| room.contains(&session_id))
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
