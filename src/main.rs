use std::time::Duration;

use tokio::sync::watch;

mod app;
mod auth;
mod bills;
mod config;
mod notify;
mod reminders;
mod reports;
mod scan;
mod state;
mod storage;
mod tasks;
mod time_fmt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "paymate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let period = Duration::from_secs(app_state.config.reminders.interval_secs.max(1));
    let scheduler = tokio::spawn(reminders::scheduler::run(
        app_state.reminders.clone(),
        period,
        shutdown_rx.clone(),
    ));

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let router = app::build_app(app_state);
    app::serve(router, shutdown_rx).await?;

    if let Err(e) = scheduler.await {
        tracing::warn!(error = %e, "reminder scheduler task ended abnormally");
    }
    Ok(())
}
