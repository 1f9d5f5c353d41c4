//! Use-case orchestration: dispatch planning, the scheduler supervisor,
//! billing, request admission and pile administration.

pub mod billing;
pub mod bootstrap;
pub mod dispatch;
pub mod piles;
pub mod ports;
pub mod requests;
pub mod scheduler;
pub mod tariff;

pub use billing::BillingService;
pub use piles::{PileAction, PileService, PileView};
pub use ports::{Scheduler, SimulatorClient};
pub use requests::{QueueStatus, RequestService, RequestView};
pub use scheduler::SchedulerService;
pub use tariff::TariffTable;
