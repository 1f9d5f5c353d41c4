//! HTTP handlers

pub mod health;
pub mod piles;
pub mod requests;
pub mod simulator;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::application::{BillingService, PileService, RequestService, SchedulerService};
use crate::infrastructure::Storage;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub requests: Arc<RequestService>,
    pub piles: Arc<PileService>,
    pub billing: Arc<BillingService>,
    pub scheduler: Arc<SchedulerService>,
    pub storage: Arc<dyn Storage>,
    pub metrics: PrometheusHandle,
}
