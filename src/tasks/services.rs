use anyhow::Context;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::tasks::{dto::TaskInput, repo, repo_types::Task};

/// Recurring tasks come back one week later.
pub const RECURRENCE_STEP: Duration = Duration::days(7);

/// Resolves the reminder instant and checks it does not trail the due time.
pub fn resolve_reminder(input: &TaskInput) -> Result<Option<OffsetDateTime>, String> {
    let remind_at = match (input.remind_at, input.reminder_offset_minutes) {
        (Some(at), _) => Some(at),
        (None, Some(mins)) if mins < 0 => {
            return Err("reminder_offset_minutes must not be negative".into())
        }
        (None, Some(mins)) => Some(input.due_at - Duration::minutes(mins)),
        (None, None) => None,
    };
    if let Some(at) = remind_at {
        if at > input.due_at {
            return Err("remind_at must not be after due_at".into());
        }
    }
    Ok(remind_at)
}

pub fn validate(input: &TaskInput) -> Result<Option<OffsetDateTime>, String> {
    if input.title.trim().is_empty() {
        return Err("Task title is required".into());
    }
    resolve_reminder(input)
}

/// Successor created when a recurring task is completed. The reminder keeps
/// its distance from the due time.
pub fn next_occurrence(task: &Task) -> Task {
    Task {
        id: Uuid::new_v4(),
        due_at: task.due_at + RECURRENCE_STEP,
        remind_at: task.remind_at.map(|r| r + RECURRENCE_STEP),
        is_completed: false,
        ..task.clone()
    }
}

/// Successor to book when a toggle moves `before` into `now_completed`.
pub fn successor_after_toggle(before: &Task, now_completed: bool) -> Option<Task> {
    (!before.is_completed && now_completed && before.is_recurring).then(|| next_occurrence(before))
}

/// Flips completion; completing a recurring task books next week's copy.
pub async fn toggle_completed(
    db: &PgPool,
    user_id: Uuid,
    task_id: Uuid,
) -> anyhow::Result<Option<(Task, Option<Task>)>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let Some(current) = repo::get_for_update_tx(&mut tx, user_id, task_id).await? else {
        return Ok(None);
    };
    let updated =
        repo::set_completed_tx(&mut tx, user_id, task_id, !current.is_completed).await?;
    let next = match successor_after_toggle(&current, updated.is_completed) {
        Some(successor) => Some(repo::insert_task_tx(&mut tx, &successor).await?),
        None => None,
    };
    tx.commit().await.context("commit tx")?;

    if let Some(next) = &next {
        debug!(task_id = %task_id, next_id = %next.id, "recurring task rolled over");
    }
    Ok(Some((updated, next)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn input(remind_at: Option<OffsetDateTime>, offset: Option<i64>) -> TaskInput {
        TaskInput {
            title: "File ITR".into(),
            due_at: datetime!(2026-10-20 18:00 UTC),
            remind_at,
            reminder_offset_minutes: offset,
            is_completed: false,
            is_recurring: true,
        }
    }

    #[test]
    fn offset_becomes_absolute_reminder() {
        let at = resolve_reminder(&input(None, Some(60))).unwrap();
        assert_eq!(at, Some(datetime!(2026-10-20 17:00 UTC)));
        assert_eq!(resolve_reminder(&input(None, None)).unwrap(), None);
    }

    #[test]
    fn explicit_reminder_wins_over_offset() {
        let explicit = datetime!(2026-10-20 09:00 UTC);
        let at = resolve_reminder(&input(Some(explicit), Some(5))).unwrap();
        assert_eq!(at, Some(explicit));
    }

    #[test]
    fn reminder_after_due_is_rejected() {
        assert!(resolve_reminder(&input(Some(datetime!(2026-10-20 18:01 UTC)), None)).is_err());
        assert!(resolve_reminder(&input(None, Some(-10))).is_err());
        // equal to the due time is allowed
        assert!(resolve_reminder(&input(Some(datetime!(2026-10-20 18:00 UTC)), None)).is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut i = input(None, None);
        i.title = " ".into();
        assert!(validate(&i).is_err());
    }

    fn task(completed: bool, recurring: bool) -> Task {
        Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Pay society maintenance".into(),
            due_at: datetime!(2026-10-21 10:00 UTC),
            remind_at: None,
            is_completed: completed,
            is_recurring: recurring,
            created_at: datetime!(2026-10-01 00:00 UTC),
        }
    }

    #[test]
    fn only_completing_a_recurring_task_books_a_successor() {
        let next = successor_after_toggle(&task(false, true), true).unwrap();
        assert_eq!(next.due_at, datetime!(2026-10-28 10:00 UTC));
        assert!(!next.is_completed);

        // complete -> incomplete creates nothing
        assert!(successor_after_toggle(&task(true, true), false).is_none());
        assert!(successor_after_toggle(&task(false, false), true).is_none());
    }

    #[test]
    fn successor_moves_exactly_one_week() {
        let task = Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Water plants".into(),
            due_at: datetime!(2026-10-19 07:30 UTC),
            remind_at: Some(datetime!(2026-10-19 07:15 UTC)),
            is_completed: true,
            is_recurring: true,
            created_at: datetime!(2026-10-01 00:00 UTC),
        };
        let next = next_occurrence(&task);
        assert_ne!(next.id, task.id);
        assert_eq!(next.due_at, datetime!(2026-10-26 07:30 UTC));
        assert_eq!(next.remind_at, Some(datetime!(2026-10-26 07:15 UTC)));
        assert!(!next.is_completed);
        assert_eq!(next.title, task.title);
    }
}
