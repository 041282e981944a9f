use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::admin::AdminState;
use crate::observability::MetricsSnapshot;

/// JSON counters for autoscalers. Read live on every request.
pub async fn get_metrics(State(state): State<AdminState>) -> Json<MetricsSnapshot> {
    Json(state.counters.snapshot())
}

pub async fn get_prometheus(State(state): State<AdminState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Prometheus exporter not installed").into_response(),
    }
}

pub async fn get_health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

pub async fn get_ready(State(state): State<AdminState>) -> (StatusCode, &'static str) {
    if state.readiness.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
