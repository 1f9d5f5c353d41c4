//! Outbound port: commands sent to the pile simulator.
//!
//! [`SimulatorClient`] is the contract that decouples the scheduler core from
//! the concrete RPC transport. The production implementation lives in
//! [`HttpSimulatorClient`](crate::infrastructure::simulator::HttpSimulatorClient);
//! scenario tests substitute a deterministic fake returning fixed start
//! times.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChargingMode, DomainResult};

/// Port for driving charging hardware through the simulator.
#[async_trait]
pub trait SimulatorClient: Send + Sync {
    /// Instruct the pile to start charging a vehicle.
    ///
    /// Returns the authoritative start time decided by the simulator; the
    /// backend stores and bills against that timestamp, not its own clock.
    async fn assign(
        &self,
        pile_id: &str,
        user_id: &str,
        requested_capacity: f64,
        mode: ChargingMode,
    ) -> DomainResult<DateTime<Utc>>;

    /// Instruct the pile to stop the current charging session.
    async fn stop(&self, pile_id: &str, user_id: &str, reason: &str) -> DomainResult<()>;
}
