use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::tasks::{dto::TaskInput, repo_types::Task};

/// All tasks of a user, soonest first.
pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Task>> {
    let rows = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, user_id, title, due_at, remind_at, is_completed, is_recurring, created_at
          FROM tasks
         WHERE user_id = $1
         ORDER BY due_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list tasks by user")?;
    Ok(rows)
}

pub async fn get(db: &PgPool, user_id: Uuid, task_id: Uuid) -> anyhow::Result<Option<Task>> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, user_id, title, due_at, remind_at, is_completed, is_recurring, created_at
          FROM tasks
         WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("get task")?;
    Ok(row)
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    input: &TaskInput,
    remind_at: Option<OffsetDateTime>,
) -> anyhow::Result<Task> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, user_id, title, due_at, remind_at, is_completed, is_recurring)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, title, due_at, remind_at, is_completed, is_recurring, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(input.title.trim())
    .bind(input.due_at)
    .bind(remind_at)
    .bind(input.is_completed)
    .bind(input.is_recurring)
    .fetch_one(db)
    .await
    .context("insert task")?;
    Ok(row)
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    task_id: Uuid,
    input: &TaskInput,
    remind_at: Option<OffsetDateTime>,
) -> anyhow::Result<Option<Task>> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
           SET title = $3, due_at = $4, remind_at = $5, is_completed = $6, is_recurring = $7
         WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, title, due_at, remind_at, is_completed, is_recurring, created_at
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .bind(input.title.trim())
    .bind(input.due_at)
    .bind(remind_at)
    .bind(input.is_completed)
    .bind(input.is_recurring)
    .fetch_optional(db)
    .await
    .context("update task")?;
    Ok(row)
}

pub async fn delete(db: &PgPool, user_id: Uuid, task_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(task_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete task")?;
    Ok(res.rows_affected() > 0)
}

/// Reads and row-locks a task for the rest of the transaction.
pub async fn get_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    task_id: Uuid,
) -> anyhow::Result<Option<Task>> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, user_id, title, due_at, remind_at, is_completed, is_recurring, created_at
          FROM tasks
         WHERE id = $1 AND user_id = $2
           FOR UPDATE
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock task")?;
    Ok(row)
}

pub async fn set_completed_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    task_id: Uuid,
    is_completed: bool,
) -> anyhow::Result<Task> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks SET is_completed = $3
         WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, title, due_at, remind_at, is_completed, is_recurring, created_at
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .bind(is_completed)
    .fetch_one(&mut **tx)
    .await
    .context("set task completed flag")?;
    Ok(row)
}

pub async fn insert_task_tx(tx: &mut Transaction<'_, Postgres>, task: &Task) -> anyhow::Result<Task> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, user_id, title, due_at, remind_at, is_completed, is_recurring)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, title, due_at, remind_at, is_completed, is_recurring, created_at
        "#,
    )
    .bind(task.id)
    .bind(task.user_id)
    .bind(&task.title)
    .bind(task.due_at)
    .bind(task.remind_at)
    .bind(task.is_completed)
    .bind(task.is_recurring)
    .fetch_one(&mut **tx)
    .await
    .context("insert successor task")?;
    Ok(row)
}
