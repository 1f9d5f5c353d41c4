//! Domain entities and value objects for the charging station core.

pub mod billing;
pub mod error;
pub mod fault;
pub mod pile;
pub mod request;
pub mod scheduling;
pub mod session;

pub use billing::{BillingDetail, TariffPeriod, TariffSegment, TariffWindow};
pub use error::{DomainError, DomainResult};
pub use fault::{FaultRecord, FaultStatus, FaultType};
pub use pile::{ChargingPile, PileStatus, PileType};
pub use request::{ChargingMode, ChargingRequest, QueueEntry, RequestStatus};
pub use scheduling::{ExtendedMode, SchedulingConfig};
pub use session::{ChargingSession, SessionStatus};
