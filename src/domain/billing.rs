//! Billing and tariff domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-of-use tariff period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffPeriod {
    Peak,
    Normal,
    Valley,
}

impl TariffPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Peak => "peak",
            Self::Normal => "normal",
            Self::Valley => "valley",
        }
    }

    /// Tie-break rank for the dominant period: peak > normal > valley.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Peak => 0,
            Self::Normal => 1,
            Self::Valley => 2,
        }
    }
}

impl std::fmt::Display for TariffPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A time-of-day interval with fixed electric and service fee rates.
///
/// Windows may wrap midnight (`start_hour > end_hour`); together the
/// configured windows cover 24h without gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffWindow {
    pub period: TariffPeriod,
    pub start_hour: u32,
    pub end_hour: u32,
    /// Electric fee per kWh
    pub electric_fee: f64,
    /// Service fee per kWh
    pub service_fee: f64,
}

impl TariffWindow {
    /// Fallback window applied to any hour not covered by configuration.
    pub fn default_normal() -> Self {
        Self {
            period: TariffPeriod::Normal,
            start_hour: 0,
            end_hour: 24,
            electric_fee: 0.7,
            service_fee: 0.8,
        }
    }
}

/// One tariff segment of a session, spanning a single tariff window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffSegment {
    pub period: TariffPeriod,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Segment duration (hours)
    pub duration_hours: f64,
    /// Energy apportioned to this segment (kWh)
    pub energy: f64,
    /// Unit electric fee of the window
    pub electric_fee: f64,
    /// Unit service fee of the window
    pub service_fee: f64,
    pub electric_cost: f64,
    pub service_cost: f64,
}

/// Frozen record of a terminal session's energy, duration and fees, split by
/// tariff window. Created exactly once per terminal session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetail {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub pile_id: String,
    /// Total billed energy (kWh)
    pub charging_capacity: f64,
    /// Total duration (hours)
    pub charging_duration: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Headline unit electric fee of the dominant period
    pub unit_price: f64,
    /// Dominant tariff period
    pub price_type: TariffPeriod,
    pub charging_fee: f64,
    pub service_fee: f64,
    pub total_fee: f64,
    pub peak_hours: f64,
    pub normal_hours: f64,
    pub valley_hours: f64,
    pub peak_energy: f64,
    pub normal_energy: f64,
    pub valley_energy: f64,
    pub segments: Vec<TariffSegment>,
    pub generated_at: DateTime<Utc>,
}

// ── Tests ──────────────────────────────────────────────────────
