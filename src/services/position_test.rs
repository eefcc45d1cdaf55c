use super::*;

// In-memory column model used to exercise the planner exactly the way the
// executor applies it: clamp, shift siblings, place the moved entity.

#[derive(Debug, Clone)]
struct Card {
    id: Uuid,
    status: TaskStatus,
    position: i32,
}

fn board(columns: &[(TaskStatus, usize)]) -> Vec<Card> {
    let mut cards = Vec::new();
    for &(status, count) in columns {
        for position in 0..count {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            cards.push(Card { id: Uuid::new_v4(), status, position: position as i32 });
        }
    }
    cards
}

fn card_at(cards: &[Card], status: TaskStatus, position: i32) -> Uuid {
    cards
        .iter()
        .find(|c| c.status == status && c.position == position)
        .expect("card at position")
        .id
}

fn simulate_move(cards: &mut [Card], id: Uuid, target: TaskStatus, requested: Option<i32>) -> i32 {
    let moved = cards.iter().find(|c| c.id == id).expect("entity exists");
    let (source_status, source_position) = (moved.status, moved.position);

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let target_count = cards.iter().filter(|c| c.status == target).count() as i32;
    let target_position = clamp_target(source_status, target, requested, target_count);

    for shift in plan_move(source_status, source_position, target, target_position) {
        for card in cards.iter_mut() {
            if card.id != id && card.status == shift.column && shift.covers(card.position) {
                card.position += shift.delta;
            }
        }
    }
    let moved = cards.iter_mut().find(|c| c.id == id).unwrap();
    moved.status = target;
    moved.position = target_position;
    target_position
}

fn simulate_delete(cards: &mut Vec<Card>, id: Uuid) {
    let idx = cards.iter().position(|c| c.id == id).expect("entity exists");
    let removed = cards.remove(idx);
    let shift = plan_remove(removed.status, removed.position);
    for card in cards.iter_mut() {
        if card.status == shift.column && shift.covers(card.position) {
            card.position += shift.delta;
        }
    }
}

/// The central correctness property: every column's positions are exactly
/// {0, …, count-1}.
fn assert_contiguous(cards: &[Card]) {
    for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done] {
        let mut positions: Vec<i32> = cards
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.position)
            .collect();
        positions.sort_unstable();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let expected: Vec<i32> = (0..positions.len() as i32).collect();
        assert_eq!(positions, expected, "column {status:?} is not contiguous");
    }
}

fn ordering(cards: &[Card], status: TaskStatus) -> Vec<Uuid> {
    let mut column: Vec<&Card> = cards.iter().filter(|c| c.status == status).collect();
    column.sort_by_key(|c| c.position);
    column.iter().map(|c| c.id).collect()
}

// =============================================================================
// PLANNER SHAPES
// =============================================================================

#[test]
fn plan_same_column_later_decrements_between() {
    let shifts = plan_move(TaskStatus::Todo, 1, TaskStatus::Todo, 4);
    assert_eq!(
        shifts,
        vec![Shift { column: TaskStatus::Todo, from: 2, to: Some(4), delta: -1 }]
    );
}

#[test]
fn plan_same_column_earlier_increments_between() {
    let shifts = plan_move(TaskStatus::Todo, 4, TaskStatus::Todo, 1);
    assert_eq!(
        shifts,
        vec![Shift { column: TaskStatus::Todo, from: 1, to: Some(3), delta: 1 }]
    );
}

#[test]
fn plan_noop_move_is_empty() {
    assert!(plan_move(TaskStatus::Todo, 2, TaskStatus::Todo, 2).is_empty());
}

#[test]
fn plan_cross_column_closes_gap_and_opens_slot() {
    let shifts = plan_move(TaskStatus::Todo, 1, TaskStatus::Done, 0);
    assert_eq!(
        shifts,
        vec![
            Shift { column: TaskStatus::Todo, from: 2, to: None, delta: -1 },
            Shift { column: TaskStatus::Done, from: 0, to: None, delta: 1 },
        ]
    );
}

#[test]
fn shift_covers_respects_bounds() {
    let bounded = Shift { column: TaskStatus::Todo, from: 2, to: Some(4), delta: -1 };
    assert!(!bounded.covers(1));
    assert!(bounded.covers(2));
    assert!(bounded.covers(4));
    assert!(!bounded.covers(5));

    let open = Shift { column: TaskStatus::Todo, from: 2, to: None, delta: -1 };
    assert!(open.covers(100));
}

// =============================================================================
// CLAMPING
// =============================================================================

#[test]
fn clamp_same_column_tops_out_at_count_minus_one() {
    assert_eq!(clamp_target(TaskStatus::Todo, TaskStatus::Todo, Some(99), 3), 2);
    assert_eq!(clamp_target(TaskStatus::Todo, TaskStatus::Todo, None, 3), 2);
}

#[test]
fn clamp_cross_column_allows_append_slot() {
    assert_eq!(clamp_target(TaskStatus::Todo, TaskStatus::Done, Some(99), 3), 3);
    assert_eq!(clamp_target(TaskStatus::Todo, TaskStatus::Done, None, 3), 3);
    assert_eq!(clamp_target(TaskStatus::Todo, TaskStatus::Done, Some(0), 0), 0);
}

#[test]
fn clamp_into_empty_same_column_is_zero() {
    // Only entity in its column: count 1, highest slot 0.
    assert_eq!(clamp_target(TaskStatus::Todo, TaskStatus::Todo, Some(5), 1), 0);
}

// =============================================================================
// INVARIANT SCENARIOS
// =============================================================================

#[test]
fn move_last_to_front_shifts_others_later() {
    // Three tasks in todo at 0,1,2; move the one at 2 to position 0.
    let mut cards = board(&[(TaskStatus::Todo, 3)]);
    let first = card_at(&cards, TaskStatus::Todo, 0);
    let second = card_at(&cards, TaskStatus::Todo, 1);
    let moved = card_at(&cards, TaskStatus::Todo, 2);

    simulate_move(&mut cards, moved, TaskStatus::Todo, Some(0));

    assert_contiguous(&cards);
    assert_eq!(ordering(&cards, TaskStatus::Todo), vec![moved, first, second]);
}

#[test]
fn cross_column_move_to_front() {
    // todo has 3, done has 2; move todo[1] to done[0].
    let mut cards = board(&[(TaskStatus::Todo, 3), (TaskStatus::Done, 2)]);
    let moved = card_at(&cards, TaskStatus::Todo, 1);
    let done_head = card_at(&cards, TaskStatus::Done, 0);

    simulate_move(&mut cards, moved, TaskStatus::Done, Some(0));

    assert_contiguous(&cards);
    assert_eq!(cards.iter().filter(|c| c.status == TaskStatus::Todo).count(), 2);
    let done = ordering(&cards, TaskStatus::Done);
    assert_eq!(done.len(), 3);
    assert_eq!(done[0], moved);
    assert_eq!(done[1], done_head);
}

#[test]
fn noop_move_leaves_column_unchanged() {
    let mut cards = board(&[(TaskStatus::Todo, 4)]);
    let before = ordering(&cards, TaskStatus::Todo);
    let moved = card_at(&cards, TaskStatus::Todo, 2);

    simulate_move(&mut cards, moved, TaskStatus::Todo, Some(2));

    assert_contiguous(&cards);
    assert_eq!(ordering(&cards, TaskStatus::Todo), before);
}

#[test]
fn round_trip_move_restores_original_ordering() {
    let mut cards = board(&[(TaskStatus::Todo, 3), (TaskStatus::Done, 2)]);
    let before_todo = ordering(&cards, TaskStatus::Todo);
    let before_done = ordering(&cards, TaskStatus::Done);
    let moved = card_at(&cards, TaskStatus::Todo, 1);

    simulate_move(&mut cards, moved, TaskStatus::Done, Some(1));
    assert_contiguous(&cards);
    simulate_move(&mut cards, moved, TaskStatus::Todo, Some(1));

    assert_contiguous(&cards);
    assert_eq!(ordering(&cards, TaskStatus::Todo), before_todo);
    assert_eq!(ordering(&cards, TaskStatus::Done), before_done);
}

#[test]
fn delete_closes_the_gap() {
    let mut cards = board(&[(TaskStatus::Todo, 4)]);
    let removed = card_at(&cards, TaskStatus::Todo, 1);
    let before = ordering(&cards, TaskStatus::Todo);

    simulate_delete(&mut cards, removed);

    assert_contiguous(&cards);
    let after = ordering(&cards, TaskStatus::Todo);
    assert_eq!(after.len(), 3);
    assert_eq!(after, before.into_iter().filter(|id| *id != removed).collect::<Vec<_>>());
}

#[test]
fn interleaved_moves_keep_every_column_contiguous() {
    let mut cards = board(&[(TaskStatus::Todo, 5), (TaskStatus::InProgress, 3), (TaskStatus::Done, 2)]);

    // A burst of concurrent-looking drags, applied in serialized order.
    // Each lookup happens against the board as the previous drop left it.
    let steps: Vec<(TaskStatus, i32, TaskStatus, Option<i32>)> = vec![
        (TaskStatus::Todo, 4, TaskStatus::InProgress, Some(0)),
        (TaskStatus::Todo, 0, TaskStatus::Done, None),
        (TaskStatus::InProgress, 3, TaskStatus::InProgress, Some(0)),
        (TaskStatus::Done, 2, TaskStatus::Todo, Some(1)),
        (TaskStatus::Todo, 3, TaskStatus::Todo, Some(0)),
    ];
    for (source, source_pos, target, requested) in steps {
        let id = card_at(&cards, source, source_pos);
        simulate_move(&mut cards, id, target, requested);
        assert_contiguous(&cards);
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn negative_position_is_rejected_before_any_write() {
    assert!(matches!(
        validate_requested(Some(-1)),
        Err(MoveError::Validation(_))
    ));
    assert!(validate_requested(Some(0)).is_ok());
    assert!(validate_requested(None).is_ok());
}

#[test]
fn status_round_trips() {
    for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done] {
        assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
    }
    for status in [
        SubtaskStatus::Planning,
        SubtaskStatus::Development,
        SubtaskStatus::Review,
        SubtaskStatus::Completed,
        SubtaskStatus::Archived,
    ] {
        assert_eq!(SubtaskStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(TaskStatus::parse("archived"), None);
    assert_eq!(SubtaskStatus::parse("todo"), None);
}
