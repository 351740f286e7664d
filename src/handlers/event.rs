use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use crate::metrics::EVENTS_TOTAL;
use crate::state::AppState;

// OneBot HTTP POST reports land here; the worker does the rest
pub async fn event_handler(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    EVENTS_TOTAL.inc();

    state.event_tx.send(event).await.map_err(|_| {
        error!("Event worker is gone, rejecting event");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Event worker is not running".to_string(),
        )
    })?;

    Ok(StatusCode::NO_CONTENT)
}
