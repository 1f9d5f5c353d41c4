//! Charging request and queue entry domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pile::PileType;

/// User-chosen charging class; maps to pile type under normal dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargingMode {
    Fast,
    Slow,
}

impl ChargingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }

    pub fn pile_type(&self) -> PileType {
        match self {
            Self::Fast => PileType::Fast,
            Self::Slow => PileType::Slow,
        }
    }

    /// Ticket prefix: `F` for fast, `T` for slow.
    pub fn prefix(&self) -> char {
        self.pile_type().prefix()
    }

    /// Mode string expected by the simulator's assign RPC.
    pub fn simulator_mode(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "trickle",
        }
    }
}

impl std::fmt::Display for ChargingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request lifecycle status. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// In the waiting area, not yet assigned to a pile
    Waiting,
    /// In a pile queue
    Queued,
    /// At position 1, charging
    Charging,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Queued => "queued",
            Self::Charging => "charging",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Charging request.
///
/// Lifecycle: admission → `waiting`; dispatch → `queued` with (pile,
/// position); reaching position 1 → `charging`; stop/complete → terminal.
/// A user has at most one request in a non-terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub charging_mode: ChargingMode,
    /// Requested energy (kWh), > 0
    pub requested_capacity: f64,
    /// Ticket (`F<n>` / `T<n>`), monotonic per mode, assigned at admission
    pub queue_number: String,
    /// Assigned pile, once dispatched
    pub pile_id: Option<String>,
    /// Position in the pile queue (1 = charging slot), 0 while waiting
    pub queue_position: u32,
    pub status: RequestStatus,
    /// Estimated wait until completion (seconds)
    pub estimated_wait_secs: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChargingRequest {
    pub fn new(
        user_id: Uuid,
        mode: ChargingMode,
        requested_capacity: f64,
        queue_number: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            charging_mode: mode,
            requested_capacity,
            queue_number: queue_number.into(),
            pile_id: None,
            queue_position: 0,
            status: RequestStatus::Waiting,
            estimated_wait_secs: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Numeric part of the ticket, used for FIFO ordering within a mode.
    pub fn ticket_seq(&self) -> u64 {
        ticket_seq(&self.queue_number)
    }
}

/// Parse the numeric suffix of a ticket (`F12` → 12). Unparseable tickets
/// order first.
pub fn ticket_seq(queue_number: &str) -> u64 {
    queue_number
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .unwrap_or(0)
}

/// A row in a per-pile queue.
///
/// Per-pile invariant: positions form a contiguous `1..k` sequence ordered by
/// insertion time; position 1 is the charging slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub pile_id: String,
    pub position: u32,
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub queue_number: String,
    pub charging_mode: ChargingMode,
    pub requested_capacity: f64,
    pub entered_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

// ── Tests ──────────────────────────────────────────────────────
