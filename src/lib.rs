//! # chargegrid
//!
//! Control core for an EV charging station: a bounded waiting area with
//! per-mode tickets, shortest-completion-time dispatch onto per-pile queues,
//! pile state machines driven through an external simulator, fault rescue
//! with recovery rebalancing, and time-of-use billing split over
//! peak/normal/valley tariff windows.
//!
//! ## Architecture
//!
//! - **domain**: entities, status enums and the error taxonomy
//! - **application**: tariff engine, dispatch planner, scheduler supervisor,
//!   billing, request admission, pile administration
//! - **infrastructure**: the `Storage` trait with its in-memory
//!   implementation, and the HTTP simulator client
//! - **interfaces**: axum HTTP delivery (user/admin API + simulator
//!   callbacks)
//! - **shared**: shutdown coordination
//! - **config**: TOML-based application configuration

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

// Re-export commonly used types at crate root
pub use application::{
    BillingService, PileService, RequestService, Scheduler, SchedulerService, SimulatorClient,
    TariffTable,
};
pub use config::{default_config_path, AppConfig};
pub use infrastructure::{HttpSimulatorClient, InMemoryStorage, Storage};
pub use interfaces::http::{create_api_router, AppState};
