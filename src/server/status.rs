//! Liveness and readiness handlers for supervisors.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::AppState;

/// Liveness probe: 200 with an empty JSON object whenever the process is up.
pub async fn health_handler() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({})))
}

/// Readiness probe: 200 once every consumer reports running, 503 otherwise.
pub async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    if state.readiness().all_running() {
        (StatusCode::OK, Json(serde_json::json!({})))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_returns_200_with_empty_object() {
        let (status, Json(body)) = health_handler().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));
    }
}
