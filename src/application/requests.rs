//! Charging request service: waiting-area admission, tickets, cancellation
//! and user-facing views.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::application::ports::Scheduler;
use crate::domain::{
    ChargingMode, ChargingRequest, DomainError, DomainResult, RequestStatus,
};
use crate::infrastructure::Storage;

/// Per-mode waiting queues and free waiting-area slots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub fast_waiting: Vec<ChargingRequest>,
    pub slow_waiting: Vec<ChargingRequest>,
    pub available_slots: u32,
}

/// Request view enriched with the live session capacity while charging.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(flatten)]
    pub request: ChargingRequest,
    pub actual_capacity: Option<f64>,
}

pub struct RequestService {
    storage: Arc<dyn Storage>,
    // injected after construction; the scheduler is built second
    scheduler: OnceLock<Arc<dyn Scheduler>>,
    fast_ticket: AtomicU64,
    slow_ticket: AtomicU64,
}

impl RequestService {
    /// Build the service, re-seeding the per-mode ticket counters from the
    /// highest persisted suffix so numbering stays monotonic across restarts.
    pub async fn new(storage: Arc<dyn Storage>) -> DomainResult<Self> {
        let fast = storage.max_ticket(ChargingMode::Fast).await?;
        let slow = storage.max_ticket(ChargingMode::Slow).await?;
        Ok(Self {
            storage,
            scheduler: OnceLock::new(),
            fast_ticket: AtomicU64::new(fast),
            slow_ticket: AtomicU64::new(slow),
        })
    }

    /// Inject the scheduler handle (construct request service first, then
    /// scheduler, then wire).
    pub fn set_scheduler(&self, scheduler: Arc<dyn Scheduler>) {
        let _ = self.scheduler.set(scheduler);
    }

    fn tick(&self) {
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.try_schedule();
        }
    }

    /// Allocate the next ticket for a mode. Numbers never repeat and gaps
    /// left by cancellations are not repaired.
    fn next_ticket(&self, mode: ChargingMode) -> String {
        let counter = match mode {
            ChargingMode::Fast => &self.fast_ticket,
            ChargingMode::Slow => &self.slow_ticket,
        };
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}{}", mode.prefix(), n)
    }

    /// Admit a request into the waiting area.
    pub async fn submit(
        &self,
        user_id: Uuid,
        mode: ChargingMode,
        requested_capacity: f64,
    ) -> DomainResult<ChargingRequest> {
        if requested_capacity <= 0.0 {
            return Err(DomainError::Validation(
                "requested capacity must be positive".into(),
            ));
        }

        if self
            .storage
            .active_request_for_user(user_id)
            .await?
            .is_some()
        {
            return Err(DomainError::UserBusy(user_id));
        }

        let config = self.storage.scheduling_config().await?;
        if self.storage.count_waiting_requests().await? >= config.waiting_area_size {
            return Err(DomainError::AreaFull);
        }

        let ticket = self.next_ticket(mode);
        let request = ChargingRequest::new(user_id, mode, requested_capacity, ticket);
        let request = self.storage.create_request(request).await?;

        info!(
            request_id = %request.id,
            %user_id,
            queue_number = %request.queue_number,
            capacity = requested_capacity,
            "request admitted"
        );

        self.tick();
        Ok(request)
    }

    /// Modify a waiting request. Changing the mode re-tickets the request in
    /// the new mode's sequence.
    pub async fn update(
        &self,
        user_id: Uuid,
        request_id: Uuid,
        mode: Option<ChargingMode>,
        requested_capacity: Option<f64>,
    ) -> DomainResult<ChargingRequest> {
        let mut request = self
            .storage
            .get_request(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", request_id))?;
        if request.user_id != user_id {
            return Err(DomainError::Forbidden(
                "request belongs to another user".into(),
            ));
        }
        if request.status != RequestStatus::Waiting {
            return Err(DomainError::NotWaiting(request_id));
        }

        if let Some(new_mode) = mode {
            if new_mode != request.charging_mode {
                request.charging_mode = new_mode;
                request.queue_number = self.next_ticket(new_mode);
            }
        }
        if let Some(capacity) = requested_capacity {
            if capacity <= 0.0 {
                return Err(DomainError::Validation(
                    "requested capacity must be positive".into(),
                ));
            }
            request.requested_capacity = capacity;
        }
        request.updated_at = chrono::Utc::now();
        self.storage.update_request(request.clone()).await?;

        self.tick();
        Ok(request)
    }

    /// Cancel a request. Waiting and queued requests finish inline; a
    /// charging request goes through the scheduler's stop-charging stream.
    pub async fn cancel(&self, user_id: Uuid, request_id: Uuid) -> DomainResult<()> {
        let request = self
            .storage
            .get_request(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", request_id))?;
        if request.user_id != user_id {
            return Err(DomainError::Forbidden(
                "request belongs to another user".into(),
            ));
        }

        match request.status {
            RequestStatus::Waiting => {
                self.storage
                    .update_request_status(request_id, RequestStatus::Cancelled)
                    .await?;
                info!(%request_id, "waiting request cancelled");
                Ok(())
            }
            RequestStatus::Queued => {
                let removed = self.storage.remove_queue_entry(request_id).await?;
                self.storage
                    .update_request_status(request_id, RequestStatus::Cancelled)
                    .await?;

                if let Some(entry) = removed {
                    let pile = self.storage.get_pile(&entry.pile_id).await?;
                    if let Some(pile) = pile {
                        self.storage
                            .update_pile_queue_length(
                                &pile.id,
                                pile.queue_length.saturating_sub(1),
                            )
                            .await?;
                    }
                    self.sync_positions(&entry.pile_id).await?;
                }

                info!(%request_id, "queued request cancelled");
                self.tick();
                Ok(())
            }
            RequestStatus::Charging => {
                let scheduler = self
                    .scheduler
                    .get()
                    .ok_or_else(|| DomainError::Downstream("scheduler not wired".into()))?;
                scheduler.stop_charging(request_id, true).await
            }
            RequestStatus::Completed | RequestStatus::Cancelled => {
                Err(DomainError::TerminalState(request_id))
            }
        }
    }

    /// Re-sync request rows with the (already renumbered) queue entries.
    async fn sync_positions(&self, pile_id: &str) -> DomainResult<()> {
        for entry in self.storage.queue_entries(pile_id).await? {
            if let Some(request) = self.storage.get_request(entry.request_id).await? {
                if request.status == RequestStatus::Queued
                    && request.queue_position != entry.position
                {
                    self.storage
                        .assign_request(
                            entry.request_id,
                            Some(pile_id.to_string()),
                            entry.position,
                            0,
                            RequestStatus::Queued,
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    pub async fn get(&self, user_id: Uuid, request_id: Uuid) -> DomainResult<RequestView> {
        let request = self
            .storage
            .get_request(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", request_id))?;
        if request.user_id != user_id {
            return Err(DomainError::Forbidden(
                "request belongs to another user".into(),
            ));
        }
        self.into_view(request).await
    }

    /// The user's current non-terminal request.
    pub async fn latest_for_user(&self, user_id: Uuid) -> DomainResult<RequestView> {
        let request = self
            .storage
            .active_request_for_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("active request for user", user_id))?;
        self.into_view(request).await
    }

    pub async fn history_for_user(&self, user_id: Uuid) -> DomainResult<Vec<ChargingRequest>> {
        self.storage.requests_for_user(user_id).await
    }

    async fn into_view(&self, request: ChargingRequest) -> DomainResult<RequestView> {
        let actual = if request.status == RequestStatus::Charging {
            self.storage
                .latest_session_for_request(request.id)
                .await?
                .map(|s| s.actual_capacity)
        } else {
            None
        };
        Ok(RequestView {
            request,
            actual_capacity: actual,
        })
    }

    pub async fn queue_status(&self, mode: Option<ChargingMode>) -> DomainResult<QueueStatus> {
        let fast = match mode {
            None | Some(ChargingMode::Fast) => {
                self.storage.waiting_requests(ChargingMode::Fast).await?
            }
            _ => Vec::new(),
        };
        let slow = match mode {
            None | Some(ChargingMode::Slow) => {
                self.storage.waiting_requests(ChargingMode::Slow).await?
            }
            _ => Vec::new(),
        };
        let config = self.storage.scheduling_config().await?;
        let waiting = self.storage.count_waiting_requests().await?;
        Ok(QueueStatus {
            fast_waiting: fast,
            slow_waiting: slow,
            available_slots: config.waiting_area_size.saturating_sub(waiting),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────
