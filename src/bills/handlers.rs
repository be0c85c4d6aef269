use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    bills::{
        dto::{BillInput, BillListQuery, TogglePaidResponse},
        repo,
        repo_types::Bill,
        services,
    },
    reminders::types::NotificationKind,
    state::AppState,
};

pub fn bill_routes() -> Router<AppState> {
    Router::new()
        .route("/bills", get(list_bills).post(create_bill))
        .route(
            "/bills/:id",
            get(get_bill).put(update_bill).delete(delete_bill),
        )
        .route("/bills/:id/toggle-paid", post(toggle_paid))
        .route("/bills/:id/document", get(bill_document))
}

const DOCUMENT_URL_TTL_SECS: u64 = 10 * 60;

#[instrument(skip(state))]
pub async fn list_bills(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<BillListQuery>,
) -> Result<Json<Vec<Bill>>, (StatusCode, String)> {
    let today = state.clock.now().date();
    let bills = repo::list_by_user(&state.db, user_id)
        .await
        .map_err(internal)?
        .into_iter()
        .filter(|b| services::matches(b, query.q.as_deref(), query.status, today))
        .collect();
    Ok(Json(bills))
}

#[instrument(skip(state, payload))]
pub async fn create_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<BillInput>,
) -> Result<(StatusCode, Json<Bill>), (StatusCode, String)> {
    services::validate(&payload, user_id).map_err(|msg| {
        warn!(user_id = %user_id, reason = %msg, "invalid bill");
        (StatusCode::BAD_REQUEST, msg)
    })?;
    let bill = repo::insert(&state.db, user_id, &payload)
        .await
        .map_err(internal)?;

    notify(&state, user_id, "Bill added successfully", NotificationKind::Success).await;
    info!(user_id = %user_id, bill_id = %bill.id, "bill created");
    Ok((StatusCode::CREATED, Json(bill)))
}

#[instrument(skip(state))]
pub async fn get_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Bill>, (StatusCode, String)> {
    repo::get(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(not_found)
}

#[instrument(skip(state, payload))]
pub async fn update_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BillInput>,
) -> Result<Json<Bill>, (StatusCode, String)> {
    services::validate(&payload, user_id).map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;
    let bill = repo::update(&state.db, user_id, id, &payload)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;

    notify(&state, user_id, "Bill updated successfully", NotificationKind::Success).await;
    Ok(Json(bill))
}

#[instrument(skip(state))]
pub async fn delete_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let bill = repo::get(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    if !repo::delete(&state.db, user_id, id).await.map_err(internal)? {
        return Err(not_found());
    }

    if let Some(key) = bill.document_key.as_deref() {
        if let Err(e) = state.storage.delete_object(key).await {
            warn!(error = %e, key = %key, "failed to delete bill document");
        }
    }

    notify(&state, user_id, "Bill deleted", NotificationKind::Info).await;
    info!(user_id = %user_id, bill_id = %id, "bill deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn toggle_paid(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TogglePaidResponse>, (StatusCode, String)> {
    let (bill, next_bill) = services::toggle_paid(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;

    if next_bill.is_some() {
        notify(
            &state,
            user_id,
            "Recurring bill created for next month",
            NotificationKind::Success,
        )
        .await;
    }
    Ok(Json(TogglePaidResponse { bill, next_bill }))
}

/// Redirects to a short-lived link for the scanned source document.
#[instrument(skip(state))]
pub async fn bill_document(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Redirect, (StatusCode, String)> {
    let bill = repo::get(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    let Some(key) = bill.document_key else {
        return Err((StatusCode::NOT_FOUND, "Bill has no document".into()));
    };
    let url = state
        .storage
        .presign_get(&key, DOCUMENT_URL_TTL_SECS)
        .await
        .map_err(internal)?;
    Ok(Redirect::temporary(&url))
}

async fn notify(state: &AppState, user_id: Uuid, message: &str, kind: NotificationKind) {
    state
        .reminders
        .inbox()
        .publish(user_id, message, kind, state.clock.now())
        .await;
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Bill not found".into())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "bill request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
