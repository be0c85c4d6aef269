pub mod dto;
pub mod gemini;
pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::scan_routes())
        .merge(handlers::advice_routes())
}
