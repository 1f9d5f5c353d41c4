//! Pile fault handling and recovery rebalancing.

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::dispatch::{self, Candidate};
use crate::application::ports::Scheduler;
use crate::domain::{
    ChargingRequest, DomainError, DomainResult, FaultRecord, FaultType, PileStatus, PileType,
    RequestStatus, SchedulingConfig,
};

use super::SchedulerService;

impl SchedulerService {
    /// Handle a fault report for a pile.
    ///
    /// The pile goes to FAULT and its queue is emptied: queued requests
    /// return to the waiting area, an in-flight session is closed as
    /// interrupted with a partial bill and its request re-enters the waiting
    /// area with the remaining capacity. The rescued set is then
    /// redistributed over the surviving same-type piles, falling back to a
    /// global rebalance when they cannot absorb it.
    pub async fn handle_pile_fault(
        &self,
        pile_id: &str,
        fault_type: FaultType,
        description: &str,
    ) -> DomainResult<()> {
        let _guard = self.mutex.lock().await;

        let pile = self
            .storage
            .get_pile(pile_id)
            .await?
            .ok_or_else(|| DomainError::not_found("pile", pile_id))?;
        if pile.status == PileStatus::Fault {
            return Err(DomainError::Validation(format!(
                "pile {} is already in fault",
                pile_id
            )));
        }

        warn!(pile_id, %fault_type, description, "pile fault reported");
        self.storage
            .update_pile_status(pile_id, PileStatus::Fault)
            .await?;

        // queued requests go back to the waiting area
        let mut rescued: Vec<Uuid> = Vec::new();
        for request in self.storage.requests_for_pile(pile_id).await? {
            if request.status != RequestStatus::Queued {
                continue;
            }
            let _ = self.storage.remove_queue_entry(request.id).await;
            self.storage
                .assign_request(request.id, None, 0, 0, RequestStatus::Waiting)
                .await?;
            rescued.push(request.id);
        }

        // an in-flight session is interrupted and partially billed; the
        // request keeps only the undelivered capacity
        if let Some(mut session) = self.storage.active_session_for_pile(pile_id).await? {
            session.interrupt(Utc::now());
            self.storage.update_session(session.clone()).await?;

            if let Some(mut request) = self.storage.get_request(session.request_id).await? {
                request.requested_capacity =
                    (request.requested_capacity - session.actual_capacity).max(0.0);
                request.pile_id = None;
                request.queue_position = 0;
                request.status = RequestStatus::Waiting;
                request.updated_at = Utc::now();
                self.storage.update_request(request).await?;
            }
            let _ = self.storage.remove_queue_entry(session.request_id).await;

            // the interrupted session still counts toward the pile's totals
            let _ = self
                .storage
                .add_pile_stats(pile_id, 1, session.duration_hours(), session.actual_capacity)
                .await;

            if let Err(e) = self.billing.generate_bill(session.id).await {
                error!(error = %e, session_id = %session.id, "partial bill failed");
            }
            rescued.push(session.request_id);
        }

        self.storage.update_pile_queue_length(pile_id, 0).await?;

        let affected = rescued.len() as u32;
        self.storage
            .insert_fault(FaultRecord::new(pile_id, fault_type, description, affected))
            .await?;

        // smart rescheduling: surviving capacity first, global rebalance as
        // the fallback
        let config = self.storage.scheduling_config().await?;
        let survivors = self
            .storage
            .available_piles(pile.pile_type, config.queue_length)
            .await?;
        let free: u32 = survivors
            .iter()
            .map(|p| config.queue_length.saturating_sub(p.queue_length))
            .sum();

        if free >= affected {
            info!(
                pile_id,
                rescued = affected,
                free, "redistributing rescued requests over surviving piles"
            );
            self.dispatch_requests(&rescued, pile.pile_type, &config).await;
        } else {
            info!(
                pile_id,
                rescued = affected,
                free, "insufficient capacity, running global rebalance"
            );
            self.global_rebalance(pile.pile_type, &rescued, &config).await;
        }

        self.try_schedule();
        Ok(())
    }

    /// Handle a recovery report for a pile.
    ///
    /// The pile returns to AVAILABLE. If other same-type piles hold queued
    /// vehicles, admission pauses while a global rebalance spreads them over
    /// the grown capacity; otherwise a plain scheduling tick suffices.
    pub async fn handle_pile_recovery(&self, pile_id: &str) -> DomainResult<()> {
        let _guard = self.mutex.lock().await;

        let pile = self
            .storage
            .get_pile(pile_id)
            .await?
            .ok_or_else(|| DomainError::not_found("pile", pile_id))?;

        info!(pile_id, "pile recovery reported");
        self.storage
            .update_pile_status(pile_id, PileStatus::Available)
            .await?;
        self.storage.update_pile_queue_length(pile_id, 0).await?;

        if let Some(fault) = self.storage.active_fault_for_pile(pile_id).await? {
            self.storage
                .resolve_fault(fault.id, Utc::now(), fault.affected_sessions)
                .await?;
        }

        let mut has_queued = false;
        for other in self.storage.list_piles_by_type(pile.pile_type).await? {
            if other.id == pile_id {
                continue;
            }
            let queued = self
                .storage
                .requests_for_pile(&other.id)
                .await?
                .into_iter()
                .any(|r| r.status == RequestStatus::Queued);
            if queued {
                has_queued = true;
                break;
            }
        }

        if has_queued {
            let config = self.storage.scheduling_config().await?;
            // pause admission so no waiting-area request is promoted while
            // the queues are being rebuilt
            self.waiting_area_lock
                .store(true, std::sync::atomic::Ordering::SeqCst);
            info!(pile_id, "admission paused for recovery rebalance");

            self.global_rebalance(pile.pile_type, &[], &config).await;

            self.waiting_area_lock
                .store(false, std::sync::atomic::Ordering::SeqCst);
            info!(pile_id, "admission resumed");
        }

        self.try_schedule();
        Ok(())
    }

    /// Dispatch a specific set of waiting requests over the same-type piles
    /// using the normal-mode algorithm.
    async fn dispatch_requests(
        &self,
        request_ids: &[Uuid],
        pile_type: PileType,
        config: &SchedulingConfig,
    ) {
        let mut requests: Vec<ChargingRequest> = Vec::new();
        for id in request_ids {
            match self.storage.get_request(*id).await {
                Ok(Some(r)) if r.status == RequestStatus::Waiting => requests.push(r),
                _ => {}
            }
        }
        if requests.is_empty() {
            return;
        }

        let mut loads = match self.pile_loads(pile_type, config.queue_length).await {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "cannot snapshot pile load");
                return;
            }
        };

        let candidates: Vec<Candidate> = requests
            .iter()
            .map(|r| Candidate {
                request_id: r.id,
                mode: r.charging_mode,
                requested_capacity: r.requested_capacity,
                ticket_seq: r.ticket_seq(),
            })
            .collect();

        let plan = dispatch::plan_normal(&candidates, &mut loads);
        for assignment in plan {
            self.place_request(assignment.request_id, &assignment.pile_id, assignment.position)
                .await;
        }
    }

    /// Displace every queued (not charging) request on same-type piles back
    /// to the waiting area, then re-dispatch the union with `extra` in ticket
    /// order. Requests that do not fit stay waiting.
    pub(super) async fn global_rebalance(
        &self,
        pile_type: PileType,
        extra: &[Uuid],
        config: &SchedulingConfig,
    ) {
        let piles = match self.storage.list_piles_by_type(pile_type).await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "cannot list piles for rebalance");
                return;
            }
        };

        let mut pool: Vec<Uuid> = extra.to_vec();
        for pile in &piles {
            let requests = match self.storage.requests_for_pile(&pile.id).await {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, pile_id = %pile.id, "cannot collect queued requests");
                    continue;
                }
            };
            for request in requests {
                if request.status != RequestStatus::Queued {
                    continue;
                }
                let _ = self.storage.remove_queue_entry(request.id).await;
                if let Err(e) = self
                    .storage
                    .assign_request(request.id, None, 0, 0, RequestStatus::Waiting)
                    .await
                {
                    error!(error = %e, request_id = %request.id, "cannot displace request");
                    continue;
                }
                pool.push(request.id);
            }
        }

        // queue lengths now reflect only the entries that remained
        for pile in &piles {
            if let Ok(entries) = self.storage.queue_entries(&pile.id).await {
                let _ = self
                    .storage
                    .update_pile_queue_length(&pile.id, entries.len() as u32)
                    .await;
            }
        }

        info!(count = pool.len(), %pile_type, "rebalancing displaced requests");
        self.dispatch_requests(&pool, pile_type, config).await;
    }
}

// ── Tests ──────────────────────────────────────────────────────
