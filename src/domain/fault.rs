//! Pile fault records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultType {
    Hardware,
    Software,
    Power,
}

impl FaultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Software => "software",
            Self::Power => "power",
        }
    }
}

impl std::fmt::Display for FaultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultStatus {
    Active,
    Resolved,
}

/// One fault episode of a pile, opened on a fault report and resolved on
/// recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultRecord {
    pub id: Uuid,
    pub pile_id: String,
    pub fault_type: FaultType,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub recovered_at: Option<DateTime<Utc>>,
    /// Requests displaced from the pile, including an interrupted session
    pub affected_sessions: u32,
    pub status: FaultStatus,
    pub created_at: DateTime<Utc>,
}

impl FaultRecord {
    pub fn new(
        pile_id: impl Into<String>,
        fault_type: FaultType,
        description: impl Into<String>,
        affected_sessions: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            pile_id: pile_id.into(),
            fault_type,
            description: description.into(),
            occurred_at: now,
            recovered_at: None,
            affected_sessions,
            status: FaultStatus::Active,
            created_at: now,
        }
    }
}
