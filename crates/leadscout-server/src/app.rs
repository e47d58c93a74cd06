use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use leadscout_core::config::LeadscoutConfig;
use leadscout_scheduler::SchedulerEngine;
use leadscout_store::Store;

/// Shared state handed to every Axum handler.
pub struct AppState {
    pub config: LeadscoutConfig,
    pub store: Arc<Store>,
    pub scheduler: Arc<SchedulerEngine>,
}

/// Assemble the full Axum router (§6 external interfaces: health, the
/// internal bot-push receiver, and the operator trigger).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/internal/telegram/send-notification",
            post(crate::http::telegram::send_notification_handler),
        )
        .route(
            "/admin/collect-messages",
            post(crate::http::admin::collect_messages_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
