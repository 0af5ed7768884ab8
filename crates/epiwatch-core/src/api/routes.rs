//! API route definitions

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};
use crate::realtime::ws_handler;

/// Create the API router with all routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/outbreaks",
            get(handlers::list_outbreaks).post(handlers::create_outbreak),
        )
        .route("/api/v1/outbreaks/recent", get(handlers::recent_outbreaks))
        .route("/api/v1/outbreaks/stats", get(handlers::outbreak_stats))
        .route(
            "/api/v1/outbreaks/:id",
            get(handlers::get_outbreak).put(handlers::update_outbreak),
        )
        .route(
            "/api/v1/alerts",
            get(handlers::list_alerts).post(handlers::create_alert),
        )
        .route("/api/v1/alerts/unread", get(handlers::unread_alerts))
        .route(
            "/api/v1/alerts/:id",
            get(handlers::get_alert)
                .put(handlers::update_alert)
                .delete(handlers::delete_alert),
        )
        .route("/api/v1/alerts/:id/read", post(handlers::mark_alert_read))
        .route("/api/v1/alerts/:id/resolve", post(handlers::resolve_alert))
        .route("/api/v1/notifications", get(handlers::list_notifications))
        .route("/api/v1/ws", get(ws_handler))
        .with_state(state)
}
