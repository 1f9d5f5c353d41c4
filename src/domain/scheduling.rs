//! Scheduling configuration

use serde::{Deserialize, Serialize};

/// Extended scheduling mode.
///
/// `Batch` waits until the waiting area can fill every free charging slot and
/// dispatches the whole set at once; `SingleOptimal` is accepted for
/// compatibility and currently behaves like normal dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtendedMode {
    Disabled,
    Batch,
    SingleOptimal,
}

impl Default for ExtendedMode {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Station scheduling parameters, persisted in the store and seeded from the
/// configuration file at bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConfig {
    pub fast_pile_count: u32,
    pub slow_pile_count: u32,
    /// Waiting-area capacity (`W`)
    pub waiting_area_size: u32,
    /// Per-pile queue bound including the charging slot (`Q`)
    pub queue_length: u32,
    /// Fast pile nominal power (kWh/h)
    pub fast_power: f64,
    /// Slow pile nominal power (kWh/h)
    pub slow_power: f64,
    pub extended_mode: ExtendedMode,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            fast_pile_count: 2,
            slow_pile_count: 3,
            waiting_area_size: 6,
            queue_length: 2,
            fast_power: 30.0,
            slow_power: 7.0,
            extended_mode: ExtendedMode::Disabled,
        }
    }
}
