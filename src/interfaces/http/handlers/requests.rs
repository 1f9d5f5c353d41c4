//! Charging request REST API handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use super::AppState;
use crate::domain::{BillingDetail, ChargingMode, ChargingRequest};
use crate::application::{QueueStatus, RequestView};
use crate::interfaces::http::dto::{
    ApiResponse, QueueStatusQuery, SubmitRequestDto, UpdateRequestDto, UserQuery,
};
use crate::interfaces::http::error::ApiError;

pub async fn submit_request(
    State(state): State<AppState>,
    Json(dto): Json<SubmitRequestDto>,
) -> Result<Json<ApiResponse<ChargingRequest>>, ApiError> {
    let request = state
        .requests
        .submit(dto.user_id, dto.charging_mode, dto.requested_capacity)
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

pub async fn update_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(dto): Json<UpdateRequestDto>,
) -> Result<Json<ApiResponse<ChargingRequest>>, ApiError> {
    let request = state
        .requests
        .update(dto.user_id, request_id, dto.charging_mode, dto.requested_capacity)
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Query(user): Query<UserQuery>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.requests.cancel(user.user_id, request_id).await?;
    Ok(Json(ApiResponse::message("request cancelled")))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Query(user): Query<UserQuery>,
) -> Result<Json<ApiResponse<RequestView>>, ApiError> {
    let view = state.requests.get(user.user_id, request_id).await?;
    Ok(Json(ApiResponse::success(view)))
}

pub async fn latest_request(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RequestView>>, ApiError> {
    let view = state.requests.latest_for_user(user_id).await?;
    Ok(Json(ApiResponse::success(view)))
}

pub async fn request_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ChargingRequest>>>, ApiError> {
    let history = state.requests.history_for_user(user_id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn queue_status(
    State(state): State<AppState>,
    Query(query): Query<QueueStatusQuery>,
) -> Result<Json<ApiResponse<QueueStatus>>, ApiError> {
    let mode = match query.mode.as_deref() {
        Some("fast") => Some(ChargingMode::Fast),
        Some("slow") => Some(ChargingMode::Slow),
        _ => None,
    };
    let status = state.requests.queue_status(mode).await?;
    Ok(Json(ApiResponse::success(status)))
}

pub async fn user_bills(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<BillingDetail>>>, ApiError> {
    let bills = state.billing.bills_for_user(user_id).await?;
    Ok(Json(ApiResponse::success(bills)))
}

pub async fn get_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BillingDetail>>, ApiError> {
    let bill = state.billing.get_bill(bill_id).await?;
    Ok(Json(ApiResponse::success(bill)))
}
