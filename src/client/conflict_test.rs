use super::*;

fn editing(order_id: Uuid, field: &str, editor: &str) -> ServerEvent {
    ServerEvent::FieldEditing {
        order_id,
        field_name: field.into(),
        editor: editor.into(),
    }
}

fn stopped(order_id: Uuid, field: &str) -> ServerEvent {
    ServerEvent::FieldStopped { order_id, field_name: field.into() }
}

#[test]
fn editing_event_sets_owner_and_badge() {
    let order = Uuid::new_v4();
    let mut store = ConflictStore::default();

    assert!(store.apply(&editing(order, "title", "bob")));
    assert_eq!(store.editor(order, "title"), Some("bob"));
    assert!(store.is_being_edited_by_other(order, "title", "alice"));
    // No badge for our own edit.
    assert!(!store.is_being_edited_by_other(order, "title", "bob"));
}

#[test]
fn stopped_event_clears_entry() {
    let order = Uuid::new_v4();
    let mut store = ConflictStore::default();
    store.apply(&editing(order, "title", "bob"));

    assert!(store.apply(&stopped(order, "title")));
    assert_eq!(store.editor(order, "title"), None);
    // A second stop is a no-op.
    assert!(!store.apply(&stopped(order, "title")));
}

#[test]
fn later_editing_event_overwrites_owner() {
    let order = Uuid::new_v4();
    let mut store = ConflictStore::default();
    store.apply(&editing(order, "title", "alice"));
    store.apply(&editing(order, "title", "bob"));

    assert_eq!(store.editor(order, "title"), Some("bob"));
}

#[test]
fn clear_order_drops_only_that_order() {
    let order_x = Uuid::new_v4();
    let order_y = Uuid::new_v4();
    let mut store = ConflictStore::default();
    store.apply(&editing(order_x, "title", "alice"));
    store.apply(&editing(order_x, "notes", "bob"));
    store.apply(&editing(order_y, "title", "carol"));

    store.clear_order(order_x);

    assert_eq!(store.editor(order_x, "title"), None);
    assert_eq!(store.editor(order_x, "notes"), None);
    assert_eq!(store.editor(order_y, "title"), Some("carol"));
}

#[test]
fn non_field_events_are_ignored() {
    let mut store = ConflictStore::default();
    let changed = store.apply(&ServerEvent::OrderDeleted { order_id: Uuid::new_v4() });
    assert!(!changed);
    assert!(store.is_empty());
}
