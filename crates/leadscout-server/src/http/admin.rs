use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use leadscout_engine::TickResult;

use crate::app::AppState;

/// POST /admin/collect-messages — forces a synchronous tick and returns its
/// aggregated result. Shares the scheduler's singleton guard, so it never
/// races a scheduled tick.
pub async fn collect_messages_handler(State(state): State<Arc<AppState>>) -> Json<TickResult> {
    let result = state.scheduler.run_once().await;
    Json(result)
}
