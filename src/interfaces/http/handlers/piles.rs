//! Pile REST API handlers

use axum::extract::{Path, State};
use axum::Json;

use super::AppState;
use crate::application::{PileAction, PileView};
use crate::domain::{ChargingPile, DomainError, FaultRecord};
use crate::interfaces::http::dto::{ApiResponse, ControlPileDto};
use crate::interfaces::http::error::ApiError;

pub async fn list_piles(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PileView>>>, ApiError> {
    let piles = state.piles.list().await?;
    Ok(Json(ApiResponse::success(piles)))
}

pub async fn get_pile(
    State(state): State<AppState>,
    Path(pile_id): Path<String>,
) -> Result<Json<ApiResponse<PileView>>, ApiError> {
    let pile = state.piles.get(&pile_id).await?;
    Ok(Json(ApiResponse::success(pile)))
}

pub async fn control_pile(
    State(state): State<AppState>,
    Path(pile_id): Path<String>,
    Json(dto): Json<ControlPileDto>,
) -> Result<Json<ApiResponse<ChargingPile>>, ApiError> {
    let action = PileAction::parse(&dto.action).ok_or_else(|| {
        DomainError::Validation(format!("unknown pile action '{}'", dto.action))
    })?;
    let pile = state.piles.control(&pile_id, action).await?;
    Ok(Json(ApiResponse::success(pile)))
}

pub async fn list_faults(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<FaultRecord>>>, ApiError> {
    let faults = state.piles.fault_records().await?;
    Ok(Json(ApiResponse::success(faults)))
}
