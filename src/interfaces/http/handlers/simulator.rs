//! Simulator callback handlers.
//!
//! The simulator reports charging progress, completions, faults, recoveries
//! and heartbeats. Reports that do not match an active session surface as
//! 5xx without touching state.

use axum::extract::State;
use axum::Json;
use tracing::debug;

use super::AppState;
use crate::interfaces::http::dto::{
    ApiResponse, ChargingCompleteReport, ChargingProgressReport, FaultRecoveryDto, FaultReportDto,
    HeartbeatDto,
};
use crate::interfaces::http::error::ApiError;

pub async fn charging_progress(
    State(state): State<AppState>,
    Json(report): Json<ChargingProgressReport>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .scheduler
        .update_progress(
            &report.pile_id,
            report.user_id,
            report.current_capacity,
            report.report_time,
        )
        .await?;
    Ok(Json(ApiResponse::message("progress recorded")))
}

pub async fn charging_complete(
    State(state): State<AppState>,
    Json(report): Json<ChargingCompleteReport>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .scheduler
        .complete_charging(
            &report.pile_id,
            report.user_id,
            report.end_time,
            report.actual_capacity,
            report.charging_duration,
        )
        .await?;
    Ok(Json(ApiResponse::message("completion processed")))
}

pub async fn fault_report(
    State(state): State<AppState>,
    Json(report): Json<FaultReportDto>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .scheduler
        .handle_pile_fault(
            &report.pile_id,
            report.fault_type,
            report.description.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(Json(ApiResponse::message("fault handled, queue rescued")))
}

pub async fn fault_recovery(
    State(state): State<AppState>,
    Json(report): Json<FaultRecoveryDto>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.scheduler.handle_pile_recovery(&report.pile_id).await?;
    Ok(Json(ApiResponse::message("pile recovered")))
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(beat): Json<HeartbeatDto>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    for pile_id in &beat.pile_ids {
        state.storage.touch_pile(pile_id, beat.timestamp).await?;
    }
    debug!(piles = beat.pile_ids.len(), "heartbeat");
    Ok(Json(ApiResponse::message("heartbeat accepted")))
}
