//! Client conflict store — mirrors field-edit ownership for lock badges.
//!
//! Entries are advisory, never blocking: the server's tracker is
//! last-start-wins and this mirror just follows its `field:editing` /
//! `field:stopped` stream. Entries for an order are dropped wholesale
//! when the user navigates away; a fresh `field:editing` rebuilds them.

#[cfg(test)]
#[path = "conflict_test.rs"]
mod conflict_test;

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Field-edit ownership as last seen over the wire, keyed by
/// (order, field).
#[derive(Debug, Clone, Default)]
pub struct ConflictStore {
    entries: HashMap<(Uuid, String), String>,
}

impl ConflictStore {
    /// Feed one server event through the store. Non-field events are
    /// ignored. Returns true if the store changed.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::FieldEditing { order_id, field_name, editor } => {
                self.entries
                    .insert((*order_id, field_name.clone()), editor.clone());
                true
            }
            ServerEvent::FieldStopped { order_id, field_name } => self
                .entries
                .remove(&(*order_id, field_name.clone()))
                .is_some(),
            _ => false,
        }
    }

    /// Identity currently editing a field, if any.
    #[must_use]
    pub fn editor(&self, order_id: Uuid, field_name: &str) -> Option<&str> {
        self.entries
            .get(&(order_id, field_name.to_owned()))
            .map(String::as_str)
    }

    /// Whether a lock badge should show for this field: someone other
    /// than ourselves is editing it.
    #[must_use]
    pub fn is_being_edited_by_other(&self, order_id: Uuid, field_name: &str, self_identity: &str) -> bool {
        self.editor(order_id, field_name)
            .is_some_and(|editor| editor != self_identity)
    }

    /// Drop every entry for an order. Called on navigate-away.
    pub fn clear_order(&mut self, order_id: Uuid) {
        self.entries.retain(|(order, _), _| *order != order_id);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
