//! Minimal ambient observability surface, gated behind the `debug_http`
//! feature (named after the teacher's own `debug_http` feature). Exposes
//! only `/health` and `/metrics` - never batch or stream detection, which
//! remain plain library entry points for an external transport layer
//! (SPEC_FULL.md §6).

use axum::routing::get;
use axum::{Json, Router};

use crate::telemetry::{self, TelemetrySnapshot};

/// Build the debug router. The caller owns binding/serving (e.g. via
/// `axum::serve`) - this crate only describes the routes.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics() -> Json<TelemetrySnapshot> {
    Json(telemetry::hub().snapshot())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    async fn response_json(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        (status, serde_json::from_slice(&bytes).expect("JSON body"))
    }

    #[tokio::test]
    async fn health_route_responds_ok_over_the_real_service() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (status, json) = response_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_route_returns_a_telemetry_snapshot() {
        telemetry::hub().record_buffer_occupancy("depth", 50.0);
        let response = router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (status, json) = response_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["total_events"].as_u64().unwrap() >= 1);
    }
}
