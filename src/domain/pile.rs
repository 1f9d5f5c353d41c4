//! Charging pile domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pile type. Fast piles serve `fast` requests, slow (trickle) piles serve
/// `slow` requests under normal dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PileType {
    Fast,
    Slow,
}

impl PileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }

    /// Queue-number and pile-id prefix: `F` for fast, `T` for slow.
    pub fn prefix(&self) -> char {
        match self {
            Self::Fast => 'F',
            Self::Slow => 'T',
        }
    }
}

impl std::fmt::Display for PileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pile status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PileStatus {
    Available,
    Occupied,
    Fault,
    Maintenance,
    Offline,
}

impl PileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Fault => "fault",
            Self::Maintenance => "maintenance",
            Self::Offline => "offline",
        }
    }

    /// Whether the pile may receive new queue assignments.
    pub fn is_admissible(&self) -> bool {
        matches!(self, Self::Available | Self::Occupied)
    }
}

impl std::fmt::Display for PileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Charging pile.
///
/// Created at bootstrap (`F1..Fn` / `T1..Tn`), never destroyed. `queue_length`
/// is derived state and must always equal the number of queue entries at the
/// pile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingPile {
    pub id: String,
    pub pile_type: PileType,
    /// Nominal charging power (kWh/h)
    pub power: f64,
    pub status: PileStatus,
    pub queue_length: u32,
    /// Cumulative completed sessions
    pub total_sessions: u32,
    /// Cumulative charging duration (hours)
    pub total_duration: f64,
    /// Cumulative delivered energy (kWh)
    pub total_energy: f64,
    /// Last heartbeat from the simulator covering this pile
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChargingPile {
    pub fn new(id: impl Into<String>, pile_type: PileType, power: f64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            pile_type,
            power,
            status: PileStatus::Available,
            queue_length: 0,
            total_sessions: 0,
            total_duration: 0.0,
            total_energy: 0.0,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seconds needed to deliver `capacity` kWh at nominal power.
    pub fn charging_secs(&self, capacity: f64) -> f64 {
        if self.power <= 0.0 {
            return 0.0;
        }
        capacity / self.power * 3600.0
    }
}

// ── Tests ──────────────────────────────────────────────────────
