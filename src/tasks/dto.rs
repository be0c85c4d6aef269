use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::tasks::repo_types::Task;

/// Request body for creating or replacing a task.
///
/// The reminder can be given either as an absolute `remind_at` or as
/// `reminder_offset_minutes` before `due_at`; the absolute value wins.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub due_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub remind_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub reminder_offset_minutes: Option<i64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleTaskResponse {
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_task: Option<Task>,
}
