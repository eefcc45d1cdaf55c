//! Optimistic move pipeline — immediate re-render, snapshot rollback.
//!
//! DESIGN
//! ======
//! A drop is applied to the working copy at once, using the same shift
//! planner the server runs, so local render order matches what the server
//! will decide. The authoritative request goes out asynchronously; on
//! success the server's answer is replayed into the confirmed snapshot,
//! which also carries any remote moves that arrived while ours was in
//! flight. On failure the confirmed snapshot is
//! restored wholesale — concurrent remote moves may have changed the
//! authoritative board in the interim, so replaying a local diff would
//! not be safe.

#[cfg(test)]
#[path = "board_test.rs"]
mod board_test;

use uuid::Uuid;

use crate::services::position::{clamp_target, plan_move};

/// One rendered card: a task or subtask as the board shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: Uuid,
    pub column: String,
    pub position: i32,
}

/// Local board state: last confirmed snapshot plus the working copy the
/// UI renders from.
#[derive(Debug, Clone, Default)]
pub struct BoardView {
    confirmed: Vec<Card>,
    working: Vec<Card>,
    pending_move: Option<Uuid>,
    /// Error from the last rolled-back move, for the UI notice.
    pub last_error: Option<String>,
}

impl BoardView {
    /// Replace both snapshots with fresh server state.
    pub fn load(&mut self, cards: Vec<Card>) {
        self.confirmed.clone_from(&cards);
        self.working = cards;
        self.pending_move = None;
        self.last_error = None;
    }

    /// Cards as the UI should render them right now.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.working
    }

    #[must_use]
    pub fn has_pending_move(&self) -> bool {
        self.pending_move.is_some()
    }

    /// Render order of one column, derived from positions.
    #[must_use]
    pub fn column_order(&self, column: &str) -> Vec<Uuid> {
        let mut cards: Vec<&Card> = self.working.iter().filter(|c| c.column == column).collect();
        cards.sort_by_key(|c| c.position);
        cards.iter().map(|c| c.id).collect()
    }

    /// Apply a drop to the working copy immediately, before the server
    /// answers. Returns the position the card landed on, or `None` if the
    /// card is unknown.
    pub fn apply_local_move(
        &mut self,
        card_id: Uuid,
        target_column: &str,
        requested_position: Option<i32>,
    ) -> Option<i32> {
        let moved = self.working.iter().find(|c| c.id == card_id)?;
        let source_column = moved.column.clone();
        let source_position = moved.position;

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let target_count = self
            .working
            .iter()
            .filter(|c| c.column == target_column)
            .count() as i32;
        let target_position = clamp_target(
            source_column.as_str(),
            target_column,
            requested_position,
            target_count,
        );

        for shift in plan_move(source_column.as_str(), source_position, target_column, target_position) {
            for card in &mut self.working {
                if card.id != card_id && card.column == shift.column && shift.covers(card.position) {
                    card.position += shift.delta;
                }
            }
        }
        let moved = self.working.iter_mut().find(|c| c.id == card_id)?;
        moved.column = target_column.to_owned();
        moved.position = target_position;

        self.pending_move = Some(card_id);
        self.last_error = None;
        Some(target_position)
    }

    /// Reconcile the server's answer: replay the returned card into the
    /// confirmed snapshot, which already holds any remote moves that
    /// landed while ours was in flight, then render from it.
    pub fn confirm(&mut self, server_card: &Card) {
        apply_authoritative(&mut self.confirmed, server_card);
        self.working.clone_from(&self.confirmed);
        self.pending_move = None;
    }

    /// The move failed: restore the last confirmed snapshot wholesale and
    /// keep the error for the UI.
    pub fn rollback(&mut self, error: impl Into<String>) {
        self.working.clone_from(&self.confirmed);
        self.pending_move = None;
        self.last_error = Some(error.into());
    }

    /// A peer's move arrived over the room. Applied to the confirmed
    /// snapshot; mirrored into the working copy unless a local move is
    /// still in flight (the confirm/rollback will settle it).
    pub fn apply_remote_move(&mut self, server_card: &Card) {
        apply_authoritative(&mut self.confirmed, server_card);
        if self.pending_move.is_none() {
            self.working.clone_from(&self.confirmed);
        }
    }
}

/// Replay an authoritative move into a snapshot using the shared planner.
fn apply_authoritative(cards: &mut Vec<Card>, server_card: &Card) {
    let Some(current) = cards.iter().find(|c| c.id == server_card.id) else {
        // Entity created elsewhere; adopt it as-is.
        cards.push(server_card.clone());
        return;
    };
    let source_column = current.column.clone();
    let source_position = current.position;

    for shift in plan_move(
        source_column.as_str(),
        source_position,
        server_card.column.as_str(),
        server_card.position,
    ) {
        for card in cards.iter_mut() {
            if card.id != server_card.id && card.column == shift.column && shift.covers(card.position) {
                card.position += shift.delta;
            }
        }
    }
    if let Some(card) = cards.iter_mut().find(|c| c.id == server_card.id) {
        card.column.clone_from(&server_card.column);
        card.position = server_card.position;
    }
}
