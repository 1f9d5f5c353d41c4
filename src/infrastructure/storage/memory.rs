//! In-memory storage implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Storage;
use crate::domain::request::ticket_seq;
use crate::domain::{
    BillingDetail, ChargingMode, ChargingPile, ChargingRequest, ChargingSession, DomainError,
    DomainResult, FaultRecord, FaultStatus, PileStatus, PileType, QueueEntry, RequestStatus,
    SchedulingConfig, TariffWindow,
};

/// In-memory store backing the scheduler core.
///
/// Durable persistence sits behind the same [`Storage`] trait; this
/// implementation serves development, tests and single-node deployments.
pub struct InMemoryStorage {
    piles: DashMap<String, ChargingPile>,
    requests: DashMap<Uuid, ChargingRequest>,
    // keyed by request id: a request has at most one queue entry
    queue: DashMap<Uuid, QueueEntry>,
    sessions: DashMap<Uuid, ChargingSession>,
    bills: DashMap<Uuid, BillingDetail>,
    // session id -> bill id, for idempotent lookups
    bill_index: DashMap<Uuid, Uuid>,
    faults: DashMap<Uuid, FaultRecord>,
    scheduling: RwLock<SchedulingConfig>,
    windows: RwLock<Vec<TariffWindow>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            piles: DashMap::new(),
            requests: DashMap::new(),
            queue: DashMap::new(),
            sessions: DashMap::new(),
            bills: DashMap::new(),
            bill_index: DashMap::new(),
            faults: DashMap::new(),
            scheduling: RwLock::new(SchedulingConfig::default()),
            windows: RwLock::new(vec![TariffWindow::default_normal()]),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_pile(&self, pile: ChargingPile) -> DomainResult<()> {
        self.piles.insert(pile.id.clone(), pile);
        Ok(())
    }

    async fn get_pile(&self, id: &str) -> DomainResult<Option<ChargingPile>> {
        Ok(self.piles.get(id).map(|p| p.clone()))
    }

    async fn list_piles(&self) -> DomainResult<Vec<ChargingPile>> {
        let mut piles: Vec<_> = self.piles.iter().map(|p| p.value().clone()).collect();
        piles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(piles)
    }

    async fn list_piles_by_type(&self, pile_type: PileType) -> DomainResult<Vec<ChargingPile>> {
        let mut piles: Vec<_> = self
            .piles
            .iter()
            .filter(|p| p.pile_type == pile_type)
            .map(|p| p.value().clone())
            .collect();
        piles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(piles)
    }

    async fn available_piles(
        &self,
        pile_type: PileType,
        max_queue_len: u32,
    ) -> DomainResult<Vec<ChargingPile>> {
        let mut piles: Vec<_> = self
            .piles
            .iter()
            .filter(|p| {
                p.pile_type == pile_type
                    && p.status.is_admissible()
                    && p.queue_length < max_queue_len
            })
            .map(|p| p.value().clone())
            .collect();
        piles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(piles)
    }

    async fn update_pile_status(&self, id: &str, status: PileStatus) -> DomainResult<()> {
        let mut pile = self
            .piles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("pile", id))?;
        pile.status = status;
        pile.updated_at = Utc::now();
        Ok(())
    }

    async fn update_pile_queue_length(&self, id: &str, queue_length: u32) -> DomainResult<()> {
        let mut pile = self
            .piles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("pile", id))?;
        pile.queue_length = queue_length;
        pile.updated_at = Utc::now();
        Ok(())
    }

    async fn add_pile_stats(
        &self,
        id: &str,
        sessions: u32,
        duration_hours: f64,
        energy: f64,
    ) -> DomainResult<()> {
        let mut pile = self
            .piles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("pile", id))?;
        pile.total_sessions += sessions;
        pile.total_duration += duration_hours;
        pile.total_energy += energy;
        pile.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_pile(&self, id: &str, seen_at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(mut pile) = self.piles.get_mut(id) {
            pile.last_seen_at = Some(seen_at);
        }
        Ok(())
    }

    async fn create_request(&self, request: ChargingRequest) -> DomainResult<ChargingRequest> {
        self.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: Uuid) -> DomainResult<Option<ChargingRequest>> {
        Ok(self.requests.get(&id).map(|r| r.clone()))
    }

    async fn update_request(&self, request: ChargingRequest) -> DomainResult<()> {
        if !self.requests.contains_key(&request.id) {
            return Err(DomainError::not_found("request", request.id));
        }
        self.requests.insert(request.id, request);
        Ok(())
    }

    async fn update_request_status(&self, id: Uuid, status: RequestStatus) -> DomainResult<()> {
        let mut request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("request", id))?;
        request.status = status;
        request.updated_at = Utc::now();
        Ok(())
    }

    async fn assign_request(
        &self,
        id: Uuid,
        pile_id: Option<String>,
        position: u32,
        estimated_wait_secs: u64,
        status: RequestStatus,
    ) -> DomainResult<()> {
        let mut request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("request", id))?;
        request.pile_id = pile_id;
        request.queue_position = position;
        request.estimated_wait_secs = estimated_wait_secs;
        request.status = status;
        request.updated_at = Utc::now();
        Ok(())
    }

    async fn active_request_for_user(
        &self,
        user_id: Uuid,
    ) -> DomainResult<Option<ChargingRequest>> {
        Ok(self
            .requests
            .iter()
            .find(|r| r.user_id == user_id && !r.status.is_terminal())
            .map(|r| r.clone()))
    }

    async fn waiting_requests(&self, mode: ChargingMode) -> DomainResult<Vec<ChargingRequest>> {
        let mut requests: Vec<_> = self
            .requests
            .iter()
            .filter(|r| r.charging_mode == mode && r.status == RequestStatus::Waiting)
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.ticket_seq());
        Ok(requests)
    }

    async fn count_waiting_requests(&self) -> DomainResult<u32> {
        Ok(self
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Waiting)
            .count() as u32)
    }

    async fn requests_for_pile(&self, pile_id: &str) -> DomainResult<Vec<ChargingRequest>> {
        let mut requests: Vec<_> = self
            .requests
            .iter()
            .filter(|r| {
                r.pile_id.as_deref() == Some(pile_id)
                    && matches!(r.status, RequestStatus::Queued | RequestStatus::Charging)
            })
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.queue_position);
        Ok(requests)
    }

    async fn requests_for_user(&self, user_id: Uuid) -> DomainResult<Vec<ChargingRequest>> {
        let mut requests: Vec<_> = self
            .requests
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn max_ticket(&self, mode: ChargingMode) -> DomainResult<u64> {
        Ok(self
            .requests
            .iter()
            .filter(|r| r.charging_mode == mode)
            .map(|r| ticket_seq(&r.queue_number))
            .max()
            .unwrap_or(0))
    }

    async fn add_queue_entry(&self, entry: QueueEntry) -> DomainResult<()> {
        self.queue.insert(entry.request_id, entry);
        Ok(())
    }

    async fn remove_queue_entry(&self, request_id: Uuid) -> DomainResult<Option<QueueEntry>> {
        let removed = self.queue.remove(&request_id).map(|(_, e)| e);
        if let Some(removed) = &removed {
            // keep positions contiguous 1..k
            for mut entry in self.queue.iter_mut() {
                if entry.pile_id == removed.pile_id && entry.position > removed.position {
                    entry.position -= 1;
                }
            }
        }
        Ok(removed)
    }

    async fn queue_entries(&self, pile_id: &str) -> DomainResult<Vec<QueueEntry>> {
        let mut entries: Vec<_> = self
            .queue
            .iter()
            .filter(|e| e.pile_id == pile_id)
            .map(|e| e.clone())
            .collect();
        entries.sort_by_key(|e| e.position);
        Ok(entries)
    }

    async fn update_entry_position(&self, request_id: Uuid, position: u32) -> DomainResult<()> {
        let mut entry = self
            .queue
            .get_mut(&request_id)
            .ok_or_else(|| DomainError::not_found("queue entry", request_id))?;
        entry.position = position;
        Ok(())
    }

    async fn mark_entry_started(&self, request_id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        let mut entry = self
            .queue
            .get_mut(&request_id)
            .ok_or_else(|| DomainError::not_found("queue entry", request_id))?;
        entry.started_at = Some(at);
        Ok(())
    }

    async fn create_session(&self, session: ChargingSession) -> DomainResult<ChargingSession> {
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn update_session(&self, session: ChargingSession) -> DomainResult<()> {
        if !self.sessions.contains_key(&session.id) {
            return Err(DomainError::not_found("session", session.id));
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> DomainResult<Option<ChargingSession>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn active_session_for_pile(
        &self,
        pile_id: &str,
    ) -> DomainResult<Option<ChargingSession>> {
        Ok(self
            .sessions
            .iter()
            .find(|s| s.pile_id == pile_id && s.is_active())
            .map(|s| s.clone()))
    }

    async fn latest_session_for_request(
        &self,
        request_id: Uuid,
    ) -> DomainResult<Option<ChargingSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.request_id == request_id)
            .max_by_key(|s| s.created_at)
            .map(|s| s.clone()))
    }

    async fn latest_session_for_pile_user(
        &self,
        pile_id: &str,
        user_id: Uuid,
    ) -> DomainResult<Option<ChargingSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.pile_id == pile_id && s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .map(|s| s.clone()))
    }

    async fn insert_bill(&self, bill: BillingDetail) -> DomainResult<BillingDetail> {
        self.bill_index.insert(bill.session_id, bill.id);
        self.bills.insert(bill.id, bill.clone());
        Ok(bill)
    }

    async fn bill_for_session(&self, session_id: Uuid) -> DomainResult<Option<BillingDetail>> {
        let bill_id = self.bill_index.get(&session_id).map(|r| *r.value());
        Ok(bill_id.and_then(|id| self.bills.get(&id).map(|b| b.clone())))
    }

    async fn get_bill(&self, id: Uuid) -> DomainResult<Option<BillingDetail>> {
        Ok(self.bills.get(&id).map(|b| b.clone()))
    }

    async fn bills_for_user(&self, user_id: Uuid) -> DomainResult<Vec<BillingDetail>> {
        let mut bills: Vec<_> = self
            .bills
            .iter()
            .filter(|b| b.user_id == user_id)
            .map(|b| b.clone())
            .collect();
        bills.sort_by_key(|b| std::cmp::Reverse(b.generated_at));
        Ok(bills)
    }

    async fn insert_fault(&self, record: FaultRecord) -> DomainResult<()> {
        self.faults.insert(record.id, record);
        Ok(())
    }

    async fn active_fault_for_pile(&self, pile_id: &str) -> DomainResult<Option<FaultRecord>> {
        Ok(self
            .faults
            .iter()
            .filter(|f| f.pile_id == pile_id && f.status == FaultStatus::Active)
            .max_by_key(|f| f.occurred_at)
            .map(|f| f.clone()))
    }

    async fn resolve_fault(
        &self,
        id: Uuid,
        recovered_at: DateTime<Utc>,
        affected_sessions: u32,
    ) -> DomainResult<()> {
        let mut record = self
            .faults
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("fault record", id))?;
        record.recovered_at = Some(recovered_at);
        record.affected_sessions = affected_sessions;
        record.status = FaultStatus::Resolved;
        Ok(())
    }

    async fn list_faults(&self) -> DomainResult<Vec<FaultRecord>> {
        let mut records: Vec<_> = self.faults.iter().map(|f| f.clone()).collect();
        records.sort_by_key(|f| std::cmp::Reverse(f.occurred_at));
        Ok(records)
    }

    async fn scheduling_config(&self) -> DomainResult<SchedulingConfig> {
        Ok(self.scheduling.read().await.clone())
    }

    async fn set_scheduling_config(&self, config: SchedulingConfig) -> DomainResult<()> {
        *self.scheduling.write().await = config;
        Ok(())
    }

    async fn tariff_windows(&self) -> DomainResult<Vec<TariffWindow>> {
        Ok(self.windows.read().await.clone())
    }

    async fn set_tariff_windows(&self, windows: Vec<TariffWindow>) -> DomainResult<()> {
        *self.windows.write().await = windows;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChargingMode;

    fn entry(pile: &str, pos: u32, req: Uuid) -> QueueEntry {
        QueueEntry {
            pile_id: pile.to_string(),
            position: pos,
            request_id: req,
            user_id: Uuid::new_v4(),
            queue_number: format!("F{}", pos),
            charging_mode: ChargingMode::Fast,
            requested_capacity: 10.0,
            entered_at: Utc::now(),
            started_at: None,
        }
    }

    #[tokio::test]
    async fn remove_entry_decrements_trailing_positions() {
        let store = InMemoryStorage::new();
        let (r1, r2, r3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.add_queue_entry(entry("F1", 1, r1)).await.unwrap();
        store.add_queue_entry(entry("F1", 2, r2)).await.unwrap();
        store.add_queue_entry(entry("F1", 3, r3)).await.unwrap();

        let removed = store.remove_queue_entry(r1).await.unwrap().unwrap();
        assert_eq!(removed.position, 1);

        let entries = store.queue_entries("F1").await.unwrap();
        let positions: Vec<u32> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(entries[0].request_id, r2);
        assert_eq!(entries[1].request_id, r3);
    }

    #[tokio::test]
    async fn remove_entry_only_touches_same_pile() {
        let store = InMemoryStorage::new();
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());
        store.add_queue_entry(entry("F1", 1, r1)).await.unwrap();
        store.add_queue_entry(entry("F2", 2, r2)).await.unwrap();

        store.remove_queue_entry(r1).await.unwrap();
        let other = store.queue_entries("F2").await.unwrap();
        assert_eq!(other[0].position, 2);
    }

    #[tokio::test]
    async fn waiting_requests_ordered_by_ticket() {
        let store = InMemoryStorage::new();
        let user = Uuid::new_v4;
        for n in [3u64, 1, 2] {
            let req =
                ChargingRequest::new(user(), ChargingMode::Fast, 10.0, format!("F{}", n));
            store.create_request(req).await.unwrap();
        }
        let waiting = store.waiting_requests(ChargingMode::Fast).await.unwrap();
        let tickets: Vec<&str> = waiting.iter().map(|r| r.queue_number.as_str()).collect();
        assert_eq!(tickets, vec!["F1", "F2", "F3"]);
    }

    #[tokio::test]
    async fn max_ticket_scans_all_statuses() {
        let store = InMemoryStorage::new();
        let mut req = ChargingRequest::new(Uuid::new_v4(), ChargingMode::Slow, 10.0, "T7");
        req.status = RequestStatus::Completed;
        store.create_request(req).await.unwrap();
        assert_eq!(store.max_ticket(ChargingMode::Slow).await.unwrap(), 7);
        assert_eq!(store.max_ticket(ChargingMode::Fast).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn available_piles_filters_status_and_capacity() {
        let store = InMemoryStorage::new();
        let mut f1 = ChargingPile::new("F1", PileType::Fast, 30.0);
        f1.queue_length = 2;
        let mut f2 = ChargingPile::new("F2", PileType::Fast, 30.0);
        f2.status = PileStatus::Fault;
        let f3 = ChargingPile::new("F3", PileType::Fast, 30.0);
        store.save_pile(f1).await.unwrap();
        store.save_pile(f2).await.unwrap();
        store.save_pile(f3).await.unwrap();

        let available = store.available_piles(PileType::Fast, 2).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, "F3");
    }

    #[tokio::test]
    async fn bill_lookup_by_session_is_stable() {
        let store = InMemoryStorage::new();
        let session_id = Uuid::new_v4();
        let bill = BillingDetail {
            id: Uuid::new_v4(),
            session_id,
            user_id: Uuid::new_v4(),
            pile_id: "F1".into(),
            charging_capacity: 10.0,
            charging_duration: 0.5,
            start_time: Utc::now(),
            end_time: Utc::now(),
            unit_price: 0.7,
            price_type: crate::domain::TariffPeriod::Normal,
            charging_fee: 7.0,
            service_fee: 8.0,
            total_fee: 15.0,
            peak_hours: 0.0,
            normal_hours: 0.5,
            valley_hours: 0.0,
            peak_energy: 0.0,
            normal_energy: 10.0,
            valley_energy: 0.0,
            segments: vec![],
            generated_at: Utc::now(),
        };
        let inserted = store.insert_bill(bill).await.unwrap();
        let found = store.bill_for_session(session_id).await.unwrap().unwrap();
        assert_eq!(found.id, inserted.id);
    }
}
