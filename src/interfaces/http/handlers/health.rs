//! Health and metrics endpoints

use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::interfaces::http::dto::ApiResponse;

pub async fn healthz(State(_state): State<AppState>) -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

/// Prometheus exposition format.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
