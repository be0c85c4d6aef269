//! Reminder engine: decides which bill and task alerts fire, delivers them,
//! and remembers what already fired.

pub mod clock;
pub mod dispatch;
mod dto;
pub mod engine;
pub mod handlers;
pub mod inbox;
pub mod scheduler;
pub mod store;
pub mod types;

use crate::state::AppState;
use axum::Router;

pub use scheduler::ReminderEngine;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::notification_routes())
        .merge(handlers::alert_routes())
}
