//! Admin HTTP surface.
//!
//! # Endpoints
//!
//! - `GET /status/health` - liveness: 200 with an empty JSON object
//! - `GET /status/ready` - readiness: 200 once every consumer is running
//! - `GET /metrics` - Prometheus text format
//! - `GET /debug/state` - per-consumer running flags, for operators

pub mod status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, Registry, TextEncoder};

pub use status::{health_handler, ready_handler};

/// Per-consumer running flags, flipped by the supervisor as consumers start
/// and stop.
#[derive(Debug)]
pub struct Readiness {
    consumers: Vec<AtomicBool>,
}

impl Readiness {
    pub fn new(consumers: usize) -> Self {
        Readiness {
            consumers: (0..consumers).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn set_running(&self, index: usize, running: bool) {
        if let Some(flag) = self.consumers.get(index) {
            flag.store(running, Ordering::SeqCst);
        }
    }

    pub fn all_running(&self) -> bool {
        self.consumers
            .iter()
            .all(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> Vec<bool> {
        self.consumers
            .iter()
            .map(|flag| flag.load(Ordering::SeqCst))
            .collect()
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    readiness: Arc<Readiness>,
    registry: Arc<Registry>,
}

impl AppState {
    pub fn new(readiness: Arc<Readiness>, registry: Arc<Registry>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                readiness,
                registry,
            }),
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.inner.readiness
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }
}

/// Renders the registry in Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> (StatusCode, String) {
    let families = state.registry().gather();
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            String::from_utf8_lossy(&buffer).into_owned(),
        ),
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

/// Operator-facing view of per-consumer state.
async fn debug_state_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "consumers": state.readiness().snapshot(),
    }))
}

/// Builds the admin router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status/health", get(health_handler))
        .route("/status/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/debug/state", get(debug_state_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(consumers: usize) -> (Router, Arc<Readiness>) {
        let readiness = Arc::new(Readiness::new(consumers));
        let registry = Arc::new(Registry::new());
        let router = build_router(AppState::new(readiness.clone(), registry));
        (router, readiness)
    }

    async fn get_status(router: Router, path: &str) -> StatusCode {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn health_is_always_200() {
        let (router, _) = app(2);
        assert_eq!(get_status(router, "/status/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_is_503_until_all_consumers_run() {
        let (router, readiness) = app(2);
        assert_eq!(
            get_status(router.clone(), "/status/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        readiness.set_running(0, true);
        assert_eq!(
            get_status(router.clone(), "/status/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        readiness.set_running(1, true);
        assert_eq!(get_status(router, "/status/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_flips_back_when_a_consumer_stops() {
        let (router, readiness) = app(1);
        readiness.set_running(0, true);
        assert_eq!(get_status(router.clone(), "/status/ready").await, StatusCode::OK);

        readiness.set_running(0, false);
        assert_eq!(
            get_status(router, "/status/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn metrics_renders_registered_counters() {
        let readiness = Arc::new(Readiness::new(1));
        let registry = Arc::new(Registry::new());
        let metrics = crate::metrics::ConsumerMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        metrics.consumed_records.inc_by(5);

        let router = build_router(AppState::new(readiness, registry));
        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("courier_consumed_records 5"));
    }

    #[tokio::test]
    async fn debug_state_lists_consumer_flags() {
        let (router, readiness) = app(3);
        readiness.set_running(1, true);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/debug/state")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["consumers"], serde_json::json!([false, true, false]));
    }
}
