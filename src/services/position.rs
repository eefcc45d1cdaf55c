//! Position reordering engine — server-authoritative Kanban ordering.
//!
//! DESIGN
//! ======
//! Every column holds its entities at positions `{0, …, count-1}` with no
//! gaps or duplicates, and that must hold immediately after every create,
//! move, and delete. The engine is split in two:
//!
//! - a pure planner that turns a logical move into ranged position shifts,
//!   shared with the client-side optimistic pipeline so both derive the
//!   same order;
//! - a sqlx executor that applies one logical move as ranged `UPDATE`s
//!   inside a single transaction, so a mid-sequence failure rolls back
//!   completely instead of leaving a column non-contiguous.
//!
//! Tasks are columned per `(order_id, status)`, subtasks per
//! `(task_id, status)`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::protocol::{SubtaskSnapshot, TaskSnapshot};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("entity not found: {0}")]
    NotFound(Uuid),
    #[error("invalid move: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Task status columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Subtask status columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Planning,
    Development,
    Review,
    Completed,
    Archived,
}

impl SubtaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Development => "development",
            Self::Review => "review",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(Self::Planning),
            "development" => Some(Self::Development),
            "review" => Some(Self::Review),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

// =============================================================================
// PLANNER
// =============================================================================

/// One ranged position shift within a column: positions in
/// `[from, to]` (or `[from, ∞)` when `to` is `None`) move by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift<C> {
    pub column: C,
    pub from: i32,
    pub to: Option<i32>,
    pub delta: i32,
}

impl<C> Shift<C> {
    /// Whether a sibling at `position` falls inside this shift's range.
    #[must_use]
    pub fn covers(&self, position: i32) -> bool {
        position >= self.from && self.to.is_none_or(|hi| position <= hi)
    }
}

/// Plan the sibling shifts for moving an entity from
/// `(source_column, source_position)` to `(target_column, target_position)`.
/// The moved entity itself is not covered by any returned shift.
pub fn plan_move<C: Copy + Eq>(
    source_column: C,
    source_position: i32,
    target_column: C,
    target_position: i32,
) -> Vec<Shift<C>> {
    if source_column == target_column {
        return match target_position.cmp(&source_position) {
            Ordering::Equal => Vec::new(),
            // Moving later: siblings in (source, target] close the gap.
            Ordering::Greater => vec![Shift {
                column: source_column,
                from: source_position + 1,
                to: Some(target_position),
                delta: -1,
            }],
            // Moving earlier: siblings in [target, source) make room.
            Ordering::Less => vec![Shift {
                column: source_column,
                from: target_position,
                to: Some(source_position - 1),
                delta: 1,
            }],
        };
    }

    vec![
        // Close the gap left in the source column.
        Shift { column: source_column, from: source_position + 1, to: None, delta: -1 },
        // Open a slot in the target column.
        Shift { column: target_column, from: target_position, to: None, delta: 1 },
    ]
}

/// Plan the sibling shift for deleting the entity at `position`.
pub fn plan_remove<C: Copy>(column: C, position: i32) -> Shift<C> {
    Shift { column, from: position + 1, to: None, delta: -1 }
}

/// Clamp a requested target position to the legal range. Within the same
/// column the highest slot is `count - 1`; cross-column the entity may
/// append at `count`. A `None` request means "append at the end".
pub fn clamp_target<C: Copy + Eq>(
    source_column: C,
    target_column: C,
    requested: Option<i32>,
    target_count: i32,
) -> i32 {
    let max = if source_column == target_column {
        target_count - 1
    } else {
        target_count
    };
    let max = max.max(0);
    requested.map_or(max, |p| p.clamp(0, max))
}

// =============================================================================
// TASK EXECUTOR
// =============================================================================

/// Move a task to `(target_status, requested_position)` as one atomic
/// transaction. `None` position appends at the end of the target column.
///
/// # Errors
///
/// `NotFound` if the task id is absent; `Validation` for a negative
/// position, rejected before any write; `Database` on sqlx failure.
pub async fn move_task(
    pool: &PgPool,
    task_id: Uuid,
    target_status: TaskStatus,
    requested_position: Option<i32>,
) -> Result<TaskSnapshot, MoveError> {
    validate_requested(requested_position)?;

    let mut tx = pool.begin().await?;

    let Some((order_id, title, status, position)) = sqlx::query_as::<_, (Uuid, String, String, i32)>(
        "SELECT order_id, title, status, position FROM tasks WHERE id = $1 FOR UPDATE",
    )
    .bind(task_id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Err(MoveError::NotFound(task_id));
    };
    let source_status = TaskStatus::parse(&status)
        .ok_or_else(|| MoveError::Validation(format!("unknown task status: {status}")))?;

    let target_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE order_id = $1 AND status = $2")
            .bind(order_id)
            .bind(target_status.as_str())
            .fetch_one(&mut *tx)
            .await?;
    let target_position = clamp_target(
        source_status,
        target_status,
        requested_position,
        i32::try_from(target_count).unwrap_or(i32::MAX),
    );

    for shift in plan_move(source_status, position, target_status, target_position) {
        apply_task_shift(&mut tx, order_id, &shift).await?;
    }

    sqlx::query("UPDATE tasks SET status = $1, position = $2, updated_at = now() WHERE id = $3")
        .bind(target_status.as_str())
        .bind(target_position)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(TaskSnapshot {
        id: task_id,
        order_id,
        title,
        status: target_status.as_str().to_owned(),
        position: target_position,
    })
}

/// Create a task appended at the end of its column.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_task(
    pool: &PgPool,
    order_id: Uuid,
    title: &str,
    status: TaskStatus,
) -> Result<TaskSnapshot, MoveError> {
    let mut tx = pool.begin().await?;

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE order_id = $1 AND status = $2")
            .bind(order_id)
            .bind(status.as_str())
            .fetch_one(&mut *tx)
            .await?;
    let position = i32::try_from(count).unwrap_or(i32::MAX);

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO tasks (id, order_id, title, status, position) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(order_id)
        .bind(title)
        .bind(status.as_str())
        .bind(position)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(TaskSnapshot { id, order_id, title: title.to_owned(), status: status.as_str().to_owned(), position })
}

/// Delete a task, closing the gap it leaves, as one transaction.
///
/// # Errors
///
/// `NotFound` if the task id is absent.
pub async fn delete_task(pool: &PgPool, task_id: Uuid) -> Result<(), MoveError> {
    let mut tx = pool.begin().await?;

    let Some((order_id, status, position)) = sqlx::query_as::<_, (Uuid, String, i32)>(
        "SELECT order_id, status, position FROM tasks WHERE id = $1 FOR UPDATE",
    )
    .bind(task_id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Err(MoveError::NotFound(task_id));
    };

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    let shift = plan_remove(status.as_str(), position);
    sqlx::query(
        "UPDATE tasks SET position = position + $1, updated_at = now()
         WHERE order_id = $2 AND status = $3 AND position >= $4",
    )
    .bind(shift.delta)
    .bind(order_id)
    .bind(shift.column)
    .bind(shift.from)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn apply_task_shift(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: Uuid,
    shift: &Shift<TaskStatus>,
) -> Result<(), sqlx::Error> {
    match shift.to {
        Some(hi) => {
            sqlx::query(
                "UPDATE tasks SET position = position + $1, updated_at = now()
                 WHERE order_id = $2 AND status = $3 AND position >= $4 AND position <= $5",
            )
            .bind(shift.delta)
            .bind(order_id)
            .bind(shift.column.as_str())
            .bind(shift.from)
            .bind(hi)
            .execute(&mut **tx)
            .await?;
        }
        None => {
            sqlx::query(
                "UPDATE tasks SET position = position + $1, updated_at = now()
                 WHERE order_id = $2 AND status = $3 AND position >= $4",
            )
            .bind(shift.delta)
            .bind(order_id)
            .bind(shift.column.as_str())
            .bind(shift.from)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

// =============================================================================
// SUBTASK EXECUTOR
// =============================================================================

/// Move a subtask within its parent task's columns. Same contract as
/// [`move_task`]; subtask columns are scoped per `(task_id, status)`.
///
/// # Errors
///
/// `NotFound` if the subtask id is absent; `Validation` for a negative
/// position; `Database` on sqlx failure.
pub async fn move_subtask(
    pool: &PgPool,
    subtask_id: Uuid,
    target_status: SubtaskStatus,
    requested_position: Option<i32>,
) -> Result<SubtaskSnapshot, MoveError> {
    validate_requested(requested_position)?;

    let mut tx = pool.begin().await?;

    let Some((task_id, order_id, title, status, position)) =
        sqlx::query_as::<_, (Uuid, Uuid, String, String, i32)>(
            "SELECT task_id, order_id, title, status, position FROM subtasks WHERE id = $1 FOR UPDATE",
        )
        .bind(subtask_id)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Err(MoveError::NotFound(subtask_id));
    };
    let source_status = SubtaskStatus::parse(&status)
        .ok_or_else(|| MoveError::Validation(format!("unknown subtask status: {status}")))?;

    let target_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subtasks WHERE task_id = $1 AND status = $2")
            .bind(task_id)
            .bind(target_status.as_str())
            .fetch_one(&mut *tx)
            .await?;
    let target_position = clamp_target(
        source_status,
        target_status,
        requested_position,
        i32::try_from(target_count).unwrap_or(i32::MAX),
    );

    for shift in plan_move(source_status, position, target_status, target_position) {
        apply_subtask_shift(&mut tx, task_id, &shift).await?;
    }

    sqlx::query("UPDATE subtasks SET status = $1, position = $2, updated_at = now() WHERE id = $3")
        .bind(target_status.as_str())
        .bind(target_position)
        .bind(subtask_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(SubtaskSnapshot {
        id: subtask_id,
        task_id,
        order_id,
        title,
        status: target_status.as_str().to_owned(),
        position: target_position,
    })
}

/// Create a subtask appended at the end of its column.
///
/// # Errors
///
/// `NotFound` if the parent task id is absent.
pub async fn create_subtask(
    pool: &PgPool,
    task_id: Uuid,
    title: &str,
    status: SubtaskStatus,
) -> Result<SubtaskSnapshot, MoveError> {
    let mut tx = pool.begin().await?;

    let Some((order_id,)) = sqlx::query_as::<_, (Uuid,)>("SELECT order_id FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Err(MoveError::NotFound(task_id));
    };

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subtasks WHERE task_id = $1 AND status = $2")
            .bind(task_id)
            .bind(status.as_str())
            .fetch_one(&mut *tx)
            .await?;
    let position = i32::try_from(count).unwrap_or(i32::MAX);

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO subtasks (id, task_id, order_id, title, status, position) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(task_id)
    .bind(order_id)
    .bind(title)
    .bind(status.as_str())
    .bind(position)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(SubtaskSnapshot {
        id,
        task_id,
        order_id,
        title: title.to_owned(),
        status: status.as_str().to_owned(),
        position,
    })
}

/// Delete a subtask, closing the gap it leaves, as one transaction.
///
/// # Errors
///
/// `NotFound` if the subtask id is absent.
pub async fn delete_subtask(pool: &PgPool, subtask_id: Uuid) -> Result<(), MoveError> {
    let mut tx = pool.begin().await?;

    let Some((task_id, status, position)) = sqlx::query_as::<_, (Uuid, String, i32)>(
        "SELECT task_id, status, position FROM subtasks WHERE id = $1 FOR UPDATE",
    )
    .bind(subtask_id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Err(MoveError::NotFound(subtask_id));
    };

    sqlx::query("DELETE FROM subtasks WHERE id = $1")
        .bind(subtask_id)
        .execute(&mut *tx)
        .await?;
    let shift = plan_remove(status.as_str(), position);
    sqlx::query(
        "UPDATE subtasks SET position = position + $1, updated_at = now()
         WHERE task_id = $2 AND status = $3 AND position >= $4",
    )
    .bind(shift.delta)
    .bind(task_id)
    .bind(shift.column)
    .bind(shift.from)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn apply_subtask_shift(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
    shift: &Shift<SubtaskStatus>,
) -> Result<(), sqlx::Error> {
    match shift.to {
        Some(hi) => {
            sqlx::query(
                "UPDATE subtasks SET position = position + $1, updated_at = now()
                 WHERE task_id = $2 AND status = $3 AND position >= $4 AND position <= $5",
            )
            .bind(shift.delta)
            .bind(task_id)
            .bind(shift.column.as_str())
            .bind(shift.from)
            .bind(hi)
            .execute(&mut **tx)
            .await?;
        }
        None => {
            sqlx::query(
                "UPDATE subtasks SET position = position + $1, updated_at = now()
                 WHERE task_id = $2 AND status = $3 AND position >= $4",
            )
            .bind(shift.delta)
            .bind(task_id)
            .bind(shift.column.as_str())
            .bind(shift.from)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

fn validate_requested(requested_position: Option<i32>) -> Result<(), MoveError> {
    match requested_position {
        Some(p) if p < 0 => Err(MoveError::Validation(format!("negative position: {p}"))),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "position_test.rs"]
mod tests;
