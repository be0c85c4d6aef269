use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, instrument};

use crate::{
    auth::services::AuthUser,
    bills,
    reports::{
        dto::{DashboardSummary, SpendingReport},
        services,
    },
    state::AppState,
};

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/reports", get(report))
}

/// Loading the dashboard also kicks off a reminder pass for the user.
#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DashboardSummary>, (StatusCode, String)> {
    let bills = bills::repo::list_by_user(&state.db, user_id)
        .await
        .map_err(internal)?;
    let summary = services::dashboard_summary(&bills, state.clock.now().date());

    let engine = state.reminders.clone();
    tokio::spawn(async move {
        engine.run_pass_for(user_id).await;
    });

    Ok(Json(summary))
}

#[instrument(skip(state))]
pub async fn report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SpendingReport>, (StatusCode, String)> {
    let bills = bills::repo::list_by_user(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(services::spending_report(&bills, state.clock.now().date())))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "report request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
