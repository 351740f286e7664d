use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "llm_backends": state.load_balancer.all_backends().len(),
        "llm_backends_healthy": state.load_balancer.healthy_count(),
        "relay_targets": state.relay.urls().len(),
        "cooldown_users": state.dispatcher.tracked_users(),
        "queue_capacity": state.event_tx.capacity(),
    }))
}
