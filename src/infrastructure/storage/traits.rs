//! Storage trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    BillingDetail, ChargingMode, ChargingPile, ChargingRequest, ChargingSession, DomainResult,
    FaultRecord, PileStatus, PileType, QueueEntry, RequestStatus, SchedulingConfig, TariffWindow,
};

/// Storage trait for persistence operations.
///
/// Durable storage is an external collaborator; each mutation is individually
/// transactional at the store level. All callers serialize mutations through
/// the scheduler, so implementations only need per-operation atomicity.
#[async_trait]
pub trait Storage: Send + Sync {
    // Pile operations
    async fn save_pile(&self, pile: ChargingPile) -> DomainResult<()>;
    async fn get_pile(&self, id: &str) -> DomainResult<Option<ChargingPile>>;
    async fn list_piles(&self) -> DomainResult<Vec<ChargingPile>>;
    async fn list_piles_by_type(&self, pile_type: PileType) -> DomainResult<Vec<ChargingPile>>;
    /// Piles of the given type with status available/occupied and a free
    /// queue slot (`queue_length < max_queue_len`), ordered by id.
    async fn available_piles(
        &self,
        pile_type: PileType,
        max_queue_len: u32,
    ) -> DomainResult<Vec<ChargingPile>>;
    async fn update_pile_status(&self, id: &str, status: PileStatus) -> DomainResult<()>;
    async fn update_pile_queue_length(&self, id: &str, queue_length: u32) -> DomainResult<()>;
    /// Add to the pile's cumulative counters.
    async fn add_pile_stats(
        &self,
        id: &str,
        sessions: u32,
        duration_hours: f64,
        energy: f64,
    ) -> DomainResult<()>;
    async fn touch_pile(&self, id: &str, seen_at: DateTime<Utc>) -> DomainResult<()>;

    // Request operations
    async fn create_request(&self, request: ChargingRequest) -> DomainResult<ChargingRequest>;
    async fn get_request(&self, id: Uuid) -> DomainResult<Option<ChargingRequest>>;
    async fn update_request(&self, request: ChargingRequest) -> DomainResult<()>;
    async fn update_request_status(&self, id: Uuid, status: RequestStatus) -> DomainResult<()>;
    /// Rewrite pile assignment, position, estimated wait and status in one
    /// step. `pile_id = None` clears the assignment.
    async fn assign_request(
        &self,
        id: Uuid,
        pile_id: Option<String>,
        position: u32,
        estimated_wait_secs: u64,
        status: RequestStatus,
    ) -> DomainResult<()>;
    /// The user's single non-terminal request, if any.
    async fn active_request_for_user(&self, user_id: Uuid)
        -> DomainResult<Option<ChargingRequest>>;
    /// Waiting-area requests of one mode in ticket order.
    async fn waiting_requests(&self, mode: ChargingMode) -> DomainResult<Vec<ChargingRequest>>;
    async fn count_waiting_requests(&self) -> DomainResult<u32>;
    /// Queued and charging requests at a pile, ordered by queue position.
    async fn requests_for_pile(&self, pile_id: &str) -> DomainResult<Vec<ChargingRequest>>;
    async fn requests_for_user(&self, user_id: Uuid) -> DomainResult<Vec<ChargingRequest>>;
    /// Highest ticket number ever issued for a mode (0 when none); used to
    /// re-seed the monotonic counters on startup.
    async fn max_ticket(&self, mode: ChargingMode) -> DomainResult<u64>;

    // Queue operations
    async fn add_queue_entry(&self, entry: QueueEntry) -> DomainResult<()>;
    /// Remove the entry for a request; positions of trailing entries at the
    /// same pile decrement to keep `1..k` contiguous.
    async fn remove_queue_entry(&self, request_id: Uuid) -> DomainResult<Option<QueueEntry>>;
    async fn queue_entries(&self, pile_id: &str) -> DomainResult<Vec<QueueEntry>>;
    async fn update_entry_position(&self, request_id: Uuid, position: u32) -> DomainResult<()>;
    async fn mark_entry_started(&self, request_id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    // Session operations
    async fn create_session(&self, session: ChargingSession) -> DomainResult<ChargingSession>;
    async fn update_session(&self, session: ChargingSession) -> DomainResult<()>;
    async fn get_session(&self, id: Uuid) -> DomainResult<Option<ChargingSession>>;
    async fn active_session_for_pile(&self, pile_id: &str)
        -> DomainResult<Option<ChargingSession>>;
    /// Most recently created session for a request.
    async fn latest_session_for_request(
        &self,
        request_id: Uuid,
    ) -> DomainResult<Option<ChargingSession>>;
    /// Most recently created session for a (pile, user) pair.
    async fn latest_session_for_pile_user(
        &self,
        pile_id: &str,
        user_id: Uuid,
    ) -> DomainResult<Option<ChargingSession>>;

    // Billing operations
    async fn insert_bill(&self, bill: BillingDetail) -> DomainResult<BillingDetail>;
    async fn bill_for_session(&self, session_id: Uuid) -> DomainResult<Option<BillingDetail>>;
    async fn get_bill(&self, id: Uuid) -> DomainResult<Option<BillingDetail>>;
    async fn bills_for_user(&self, user_id: Uuid) -> DomainResult<Vec<BillingDetail>>;

    // Fault records
    async fn insert_fault(&self, record: FaultRecord) -> DomainResult<()>;
    async fn active_fault_for_pile(&self, pile_id: &str) -> DomainResult<Option<FaultRecord>>;
    async fn resolve_fault(
        &self,
        id: Uuid,
        recovered_at: DateTime<Utc>,
        affected_sessions: u32,
    ) -> DomainResult<()>;
    async fn list_faults(&self) -> DomainResult<Vec<FaultRecord>>;

    // System configuration
    async fn scheduling_config(&self) -> DomainResult<SchedulingConfig>;
    async fn set_scheduling_config(&self, config: SchedulingConfig) -> DomainResult<()>;
    async fn tariff_windows(&self) -> DomainResult<Vec<TariffWindow>>;
    async fn set_tariff_windows(&self, windows: Vec<TariffWindow>) -> DomainResult<()>;
}
