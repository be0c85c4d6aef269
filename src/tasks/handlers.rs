use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    reminders::types::NotificationKind,
    state::AppState,
    tasks::{
        dto::{TaskInput, ToggleTaskResponse},
        repo,
        repo_types::Task,
        services,
    },
};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/toggle", post(toggle_task))
}

#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = repo::list_by_user(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(tasks))
}

#[instrument(skip(state, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<TaskInput>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    let remind_at = services::validate(&payload).map_err(|msg| {
        warn!(user_id = %user_id, reason = %msg, "invalid task");
        (StatusCode::BAD_REQUEST, msg)
    })?;
    let task = repo::insert(&state.db, user_id, &payload, remind_at)
        .await
        .map_err(internal)?;

    notify(&state, user_id, "Task added", NotificationKind::Success).await;
    info!(user_id = %user_id, task_id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, String)> {
    repo::get(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(not_found)
}

#[instrument(skip(state, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskInput>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let remind_at = services::validate(&payload).map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;
    let task = repo::update(&state.db, user_id, id, &payload, remind_at)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;

    notify(&state, user_id, "Task updated", NotificationKind::Success).await;
    Ok(Json(task))
}

#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !repo::delete(&state.db, user_id, id).await.map_err(internal)? {
        return Err(not_found());
    }
    notify(&state, user_id, "Task deleted", NotificationKind::Info).await;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn toggle_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleTaskResponse>, (StatusCode, String)> {
    let (task, next_task) = services::toggle_completed(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    Ok(Json(ToggleTaskResponse { task, next_task }))
}

async fn notify(state: &AppState, user_id: Uuid, message: &str, kind: NotificationKind) {
    state
        .reminders
        .inbox()
        .publish(user_id, message, kind, state.clock.now())
        .await;
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Task not found".into())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "task request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
