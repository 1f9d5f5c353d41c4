//! HTTP payloads for the user/admin API and the simulator callback API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChargingMode, FaultType};

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "ok".into(),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }
}

// ── User/admin API ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestDto {
    pub user_id: Uuid,
    pub charging_mode: ChargingMode,
    pub requested_capacity: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestDto {
    pub user_id: Uuid,
    #[serde(default)]
    pub charging_mode: Option<ChargingMode>,
    #[serde(default)]
    pub requested_capacity: Option<f64>,
}

/// `?userId=` query for owner-scoped lookups.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct QueueStatusQuery {
    /// `all` (default), `fast` or `slow`
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPileDto {
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

// ── Simulator callbacks ────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingProgressReport {
    pub pile_id: String,
    pub user_id: Uuid,
    pub start_time: Option<DateTime<Utc>>,
    pub current_capacity: f64,
    pub requested_capacity: Option<f64>,
    /// kWh/h
    pub charging_rate: Option<f64>,
    /// seconds
    pub remaining_time: Option<i64>,
    pub report_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingCompleteReport {
    pub pile_id: String,
    pub user_id: Uuid,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub requested_capacity: Option<f64>,
    pub actual_capacity: f64,
    /// seconds
    pub charging_duration: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultReportDto {
    pub pile_id: String,
    pub fault_type: FaultType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultRecoveryDto {
    pub pile_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatDto {
    pub pile_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
