//! Charging session domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One physical charging event at a pile.
///
/// Created when a request reaches the charging slot. The start time is
/// provisional until the simulator acknowledges the assignment with its
/// authoritative timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSession {
    pub id: Uuid,
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub pile_id: String,
    pub queue_number: String,
    pub requested_capacity: f64,
    /// Accumulated energy (kWh), non-decreasing, clamped to requested
    pub actual_capacity: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    /// Charging duration (seconds)
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
}

impl ChargingSession {
    pub fn new(
        request_id: Uuid,
        user_id: Uuid,
        pile_id: impl Into<String>,
        queue_number: impl Into<String>,
        requested_capacity: f64,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            user_id,
            pile_id: pile_id.into(),
            queue_number: queue_number.into(),
            requested_capacity,
            actual_capacity: 0.0,
            start_time,
            end_time: None,
            status: SessionStatus::Active,
            duration_secs: 0.0,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Apply a progress report. `actual_capacity` is kept monotone
    /// non-decreasing and clamped to the requested capacity; the report time
    /// becomes the provisional end time.
    pub fn record_progress(&mut self, current_capacity: f64, report_time: DateTime<Utc>) {
        let clamped = current_capacity.min(self.requested_capacity);
        if clamped > self.actual_capacity {
            self.actual_capacity = clamped;
        }
        self.end_time = Some(report_time);
    }

    /// Close the session at `end`. The final status is `Completed` when the
    /// requested energy was delivered, `Interrupted` otherwise.
    pub fn close(&mut self, end: DateTime<Utc>) {
        self.end_time = Some(end);
        self.duration_secs = (end - self.start_time).num_milliseconds() as f64 / 1000.0;
        if self.actual_capacity > self.requested_capacity {
            self.actual_capacity = self.requested_capacity;
        }
        self.status = if self.actual_capacity >= self.requested_capacity {
            SessionStatus::Completed
        } else {
            SessionStatus::Interrupted
        };
    }

    /// Close the session as `Interrupted` regardless of delivered energy
    /// (pile fault, forced stop).
    pub fn interrupt(&mut self, end: DateTime<Utc>) {
        self.end_time = Some(end);
        self.duration_secs = (end - self.start_time).num_milliseconds() as f64 / 1000.0;
        if self.actual_capacity > self.requested_capacity {
            self.actual_capacity = self.requested_capacity;
        }
        self.status = SessionStatus::Interrupted;
    }

    /// Charging duration in hours, for pile statistics.
    pub fn duration_hours(&self) -> f64 {
        self.duration_secs / 3600.0
    }
}

// ── Tests ──────────────────────────────────────────────────────
