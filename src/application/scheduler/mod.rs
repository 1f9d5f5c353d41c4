//! Scheduler supervisor: the single-threaded cooperative core.
//!
//! All scheduling rounds, charging-state transitions, fault handling and
//! recovery rebalancing are serialized under one mutex. Other components post
//! events into two bounded streams (a coalescing `schedule` stream and a
//! `stop-charging` stream) which the supervisor drains in spawned loops.

pub mod recovery;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::billing::BillingService;
use crate::application::dispatch::{self, Candidate, PileLoad};
use crate::application::ports::{Scheduler, SimulatorClient};
use crate::domain::{
    ChargingMode, ChargingRequest, ChargingSession, DomainError, DomainResult, ExtendedMode,
    PileStatus, PileType, QueueEntry, RequestStatus, SchedulingConfig, SessionStatus,
};
use crate::infrastructure::Storage;
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug)]
struct StopCommand {
    request_id: Uuid,
    cancel: bool,
}

/// The supervisor owning admission ticks, pile state machines, fault and
/// recovery handling.
pub struct SchedulerService {
    storage: Arc<dyn Storage>,
    simulator: Arc<dyn SimulatorClient>,
    billing: Arc<BillingService>,
    /// Pauses scheduling ticks while a recovery rebalance runs
    waiting_area_lock: AtomicBool,
    mutex: Mutex<()>,
    schedule_tx: mpsc::Sender<()>,
    stop_tx: mpsc::Sender<StopCommand>,
    schedule_rx: std::sync::Mutex<Option<mpsc::Receiver<()>>>,
    stop_rx: std::sync::Mutex<Option<mpsc::Receiver<StopCommand>>>,
}

impl SchedulerService {
    pub fn new(
        storage: Arc<dyn Storage>,
        simulator: Arc<dyn SimulatorClient>,
        billing: Arc<BillingService>,
    ) -> Arc<Self> {
        let (schedule_tx, schedule_rx) = mpsc::channel(100);
        let (stop_tx, stop_rx) = mpsc::channel(100);
        Arc::new(Self {
            storage,
            simulator,
            billing,
            waiting_area_lock: AtomicBool::new(false),
            mutex: Mutex::new(()),
            schedule_tx,
            stop_tx,
            schedule_rx: std::sync::Mutex::new(Some(schedule_rx)),
            stop_rx: std::sync::Mutex::new(Some(stop_rx)),
        })
    }

    /// Spawn the two supervisor loops. Call once at startup.
    pub fn start(self: &Arc<Self>, shutdown: ShutdownSignal) {
        let schedule_rx = self.schedule_rx.lock().unwrap().take();
        if let Some(mut rx) = schedule_rx {
            let svc = Arc::clone(self);
            let signal = shutdown.clone();
            tokio::spawn(async move {
                info!("scheduler loop started");
                loop {
                    tokio::select! {
                        maybe = rx.recv() => match maybe {
                            Some(()) => svc.execute_schedule().await,
                            None => break,
                        },
                        _ = signal.notified().wait() => break,
                    }
                }
                info!("scheduler loop stopped");
            });
        }

        let stop_rx = self.stop_rx.lock().unwrap().take();
        if let Some(mut rx) = stop_rx {
            let svc = Arc::clone(self);
            tokio::spawn(async move {
                info!("stop-charging loop started");
                loop {
                    tokio::select! {
                        maybe = rx.recv() => match maybe {
                            Some(cmd) => svc.execute_stop_charging(cmd.request_id, cmd.cancel).await,
                            None => break,
                        },
                        _ = shutdown.notified().wait() => break,
                    }
                }
                info!("stop-charging loop stopped");
            });
        }
    }

    pub fn waiting_area_locked(&self) -> bool {
        self.waiting_area_lock.load(Ordering::SeqCst)
    }

    // ── Scheduling rounds ──────────────────────────────────────

    /// One scheduling round. Coalesced ticks arrive here; the round is a
    /// no-op while the waiting area is locked for a recovery rebalance.
    pub async fn execute_schedule(&self) {
        if self.waiting_area_locked() {
            return;
        }
        let _guard = self.mutex.lock().await;

        let config = match self.storage.scheduling_config().await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "cannot load scheduling config");
                return;
            }
        };

        self.restart_stalled_heads().await;

        if config.extended_mode == ExtendedMode::Batch {
            self.run_batch_round(&config).await;
        } else {
            self.run_normal_round(&config).await;
        }

        metrics::counter!("chargegrid_scheduling_rounds_total").increment(1);
    }

    async fn run_normal_round(&self, config: &SchedulingConfig) {
        for pile_type in [PileType::Fast, PileType::Slow] {
            let mode = match pile_type {
                PileType::Fast => ChargingMode::Fast,
                PileType::Slow => ChargingMode::Slow,
            };
            let waiting = match self.storage.waiting_requests(mode).await {
                Ok(w) => w,
                Err(e) => {
                    error!(error = %e, %mode, "cannot load waiting requests");
                    continue;
                }
            };
            if waiting.is_empty() {
                continue;
            }

            let mut loads = match self.pile_loads(pile_type, config.queue_length).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, "cannot snapshot pile load");
                    continue;
                }
            };

            let candidates = to_candidates(&waiting);
            let plan = dispatch::plan_normal(&candidates, &mut loads);
            for assignment in plan {
                self.place_request(assignment.request_id, &assignment.pile_id, assignment.position)
                    .await;
            }
        }
    }

    async fn run_batch_round(&self, config: &SchedulingConfig) {
        let mut loads = Vec::new();
        for pile_type in [PileType::Fast, PileType::Slow] {
            match self.pile_loads(pile_type, config.queue_length).await {
                Ok(mut l) => loads.append(&mut l),
                Err(e) => {
                    error!(error = %e, "cannot snapshot pile load");
                    return;
                }
            }
        }

        let mut waiting = Vec::new();
        for mode in [ChargingMode::Fast, ChargingMode::Slow] {
            match self.storage.waiting_requests(mode).await {
                Ok(mut w) => waiting.append(&mut w),
                Err(e) => {
                    error!(error = %e, "cannot load waiting requests");
                    return;
                }
            }
        }

        let candidates = to_candidates(&waiting);
        match dispatch::plan_batch(&candidates, &mut loads) {
            None => {
                let total_slots: u32 = loads.iter().map(|p| p.free_slots()).sum();
                debug!(
                    waiting = candidates.len(),
                    total_slots, "batch round deferred"
                );
            }
            Some(plan) => {
                info!(assignments = plan.len(), "batch round dispatched");
                for assignment in plan {
                    self.place_request(
                        assignment.request_id,
                        &assignment.pile_id,
                        assignment.position,
                    )
                    .await;
                }
            }
        }
    }

    /// Snapshot admissible piles of one type with their queued capacities.
    async fn pile_loads(
        &self,
        pile_type: PileType,
        queue_length: u32,
    ) -> DomainResult<Vec<PileLoad>> {
        let piles = self.storage.available_piles(pile_type, queue_length).await?;
        let mut loads = Vec::with_capacity(piles.len());
        for pile in piles {
            let queued = self
                .storage
                .requests_for_pile(&pile.id)
                .await?
                .into_iter()
                .map(|r| r.requested_capacity)
                .collect();
            loads.push(PileLoad {
                id: pile.id,
                power: pile.power,
                capacity: queue_length,
                queued,
            });
        }
        Ok(loads)
    }

    /// Commit one planned assignment: request → `queued`, queue entry added,
    /// pile queue length bumped. A request placed at position 1 starts
    /// charging immediately.
    async fn place_request(&self, request_id: Uuid, pile_id: &str, position: u32) {
        let request = match self.storage.get_request(request_id).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                warn!(%request_id, "assigned request vanished");
                return;
            }
            Err(e) => {
                error!(error = %e, %request_id, "cannot load request");
                return;
            }
        };
        let pile = match self.storage.get_pile(pile_id).await {
            Ok(Some(p)) => p,
            _ => {
                warn!(pile_id, "assigned pile vanished");
                return;
            }
        };

        let queued_ahead: f64 = match self.storage.requests_for_pile(pile_id).await {
            Ok(reqs) => reqs.iter().map(|r| r.requested_capacity).sum(),
            Err(_) => 0.0,
        };
        let estimated_wait = if pile.power > 0.0 {
            ((queued_ahead + request.requested_capacity) / pile.power * 3600.0) as u64
        } else {
            0
        };

        if let Err(e) = self
            .storage
            .assign_request(
                request_id,
                Some(pile_id.to_string()),
                position,
                estimated_wait,
                RequestStatus::Queued,
            )
            .await
        {
            error!(error = %e, %request_id, "cannot assign request");
            return;
        }

        if let Err(e) = self
            .storage
            .update_pile_queue_length(pile_id, pile.queue_length + 1)
            .await
        {
            error!(error = %e, pile_id, "cannot bump queue length");
            return;
        }

        let entry = QueueEntry {
            pile_id: pile_id.to_string(),
            position,
            request_id,
            user_id: request.user_id,
            queue_number: request.queue_number.clone(),
            charging_mode: request.charging_mode,
            requested_capacity: request.requested_capacity,
            entered_at: Utc::now(),
            started_at: None,
        };
        if let Err(e) = self.storage.add_queue_entry(entry).await {
            error!(error = %e, %request_id, "cannot add queue entry");
            return;
        }

        info!(
            %request_id,
            queue_number = %request.queue_number,
            pile_id,
            position,
            "request dispatched"
        );

        if position == 1 {
            self.start_charging(request_id, pile_id).await;
        }
    }

    /// Ensure every available pile with a non-empty queue has its head
    /// charging. Covers promotion after completions and retries after a
    /// failed assign RPC.
    async fn restart_stalled_heads(&self) {
        let piles = match self.storage.list_piles().await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "cannot list piles");
                return;
            }
        };
        for pile in piles {
            if pile.status != PileStatus::Available || pile.queue_length == 0 {
                continue;
            }
            let head = match self.storage.queue_entries(&pile.id).await {
                Ok(entries) => entries.into_iter().next(),
                Err(_) => None,
            };
            if let Some(head) = head {
                self.start_charging(head.request_id, &pile.id).await;
            }
        }
    }

    /// Drive the head-of-queue request into charging.
    ///
    /// Idempotent: an existing active session is reused, so a retry after a
    /// failed assign RPC only re-issues the RPC. The pile advances to
    /// OCCUPIED only once the simulator acknowledges with its authoritative
    /// start time.
    async fn start_charging(&self, request_id: Uuid, pile_id: &str) {
        let request = match self.storage.get_request(request_id).await {
            Ok(Some(r)) => r,
            _ => {
                warn!(%request_id, "charging candidate vanished");
                return;
            }
        };

        let existing = match self.storage.latest_session_for_request(request_id).await {
            Ok(s) => s.filter(|s| s.is_active()),
            Err(e) => {
                error!(error = %e, %request_id, "cannot look up session");
                return;
            }
        };

        let mut session = match existing {
            Some(s) => s,
            None => {
                if let Err(e) = self
                    .storage
                    .update_request_status(request_id, RequestStatus::Charging)
                    .await
                {
                    error!(error = %e, %request_id, "cannot mark request charging");
                    return;
                }
                let _ = self.storage.mark_entry_started(request_id, Utc::now()).await;

                // provisional start time, rewritten by the simulator's reply
                let session = ChargingSession::new(
                    request_id,
                    request.user_id,
                    pile_id,
                    request.queue_number.clone(),
                    request.requested_capacity,
                    Utc::now(),
                );
                match self.storage.create_session(session).await {
                    Ok(s) => s,
                    Err(e) => {
                        error!(error = %e, %request_id, "cannot create session");
                        return;
                    }
                }
            }
        };

        match self
            .simulator
            .assign(
                pile_id,
                &request.user_id.to_string(),
                request.requested_capacity,
                request.charging_mode,
            )
            .await
        {
            Ok(start_time) => {
                session.start_time = start_time;
                if let Err(e) = self.storage.update_session(session).await {
                    error!(error = %e, %request_id, "cannot store authoritative start time");
                }
                if let Err(e) = self
                    .storage
                    .update_pile_status(pile_id, PileStatus::Occupied)
                    .await
                {
                    error!(error = %e, pile_id, "cannot mark pile occupied");
                }
                info!(%request_id, pile_id, %start_time, "charging started");
            }
            Err(e) => {
                // pile stays pre-RPC; the head retries on the next tick
                warn!(error = %e, %request_id, pile_id, "assign failed, will retry");
            }
        }
    }

    // ── Progress & completion reports ──────────────────────────

    /// Apply a progress report from the simulator. The report must match the
    /// pile's active session and user.
    pub async fn update_progress(
        &self,
        pile_id: &str,
        user_id: Uuid,
        current_capacity: f64,
        report_time: chrono::DateTime<Utc>,
    ) -> DomainResult<()> {
        let _guard = self.mutex.lock().await;

        let mut session = self
            .storage
            .active_session_for_pile(pile_id)
            .await?
            .ok_or_else(|| {
                DomainError::Inconsistency(format!("no active session at pile {}", pile_id))
            })?;
        if session.user_id != user_id {
            return Err(DomainError::Inconsistency(format!(
                "progress user {} does not match session user {}",
                user_id, session.user_id
            )));
        }

        session.record_progress(current_capacity, report_time);
        self.storage.update_session(session).await?;
        debug!(pile_id, %user_id, current_capacity, "progress recorded");
        Ok(())
    }

    /// Finalise a session on the simulator's completion report. Idempotent at
    /// the (pile, user) level: duplicates for an already-completed session
    /// are acknowledged without state change.
    pub async fn complete_charging(
        &self,
        pile_id: &str,
        user_id: Uuid,
        end_time: chrono::DateTime<Utc>,
        actual_capacity: f64,
        charging_duration_secs: u64,
    ) -> DomainResult<()> {
        let _guard = self.mutex.lock().await;

        let session = self.storage.active_session_for_pile(pile_id).await?;
        let mut session = match session {
            Some(s) => s,
            None => {
                if let Some(prev) = self
                    .storage
                    .latest_session_for_pile_user(pile_id, user_id)
                    .await?
                {
                    if prev.status == SessionStatus::Completed {
                        info!(pile_id, %user_id, "duplicate completion report ignored");
                        return Ok(());
                    }
                }
                return Err(DomainError::Inconsistency(format!(
                    "no active session at pile {}",
                    pile_id
                )));
            }
        };
        if session.user_id != user_id {
            return Err(DomainError::Inconsistency(format!(
                "completion user {} does not match session user {}",
                user_id, session.user_id
            )));
        }

        session.end_time = Some(end_time);
        session.actual_capacity = actual_capacity.min(session.requested_capacity);
        session.duration_secs = charging_duration_secs as f64;
        session.status = SessionStatus::Completed;
        self.storage.update_session(session.clone()).await?;

        self.storage
            .update_request_status(session.request_id, RequestStatus::Completed)
            .await?;
        self.storage.remove_queue_entry(session.request_id).await?;

        self.release_pile_slot(pile_id, &session).await?;

        if let Err(e) = self.billing.generate_bill(session.id).await {
            error!(error = %e, session_id = %session.id, "bill generation failed");
        }

        self.renumber_and_promote(pile_id).await;
        metrics::counter!("chargegrid_sessions_completed_total").increment(1);

        info!(
            pile_id,
            %user_id,
            actual = session.actual_capacity,
            duration_secs = charging_duration_secs,
            "charging completed"
        );

        self.try_schedule();
        Ok(())
    }

    /// Stop the charging session of a request (user cancellation or forced
    /// stop). Simulator errors are logged; local finalisation proceeds.
    pub async fn execute_stop_charging(&self, request_id: Uuid, cancel: bool) {
        let _guard = self.mutex.lock().await;

        let request = match self.storage.get_request(request_id).await {
            Ok(Some(r)) => r,
            _ => {
                warn!(%request_id, "stop requested for unknown request");
                return;
            }
        };
        if request.status != RequestStatus::Charging {
            warn!(%request_id, status = %request.status, "stop requested but not charging");
            return;
        }
        let Some(pile_id) = request.pile_id.clone() else {
            warn!(%request_id, "charging request without pile");
            return;
        };

        let reason = if cancel { "user cancelled" } else { "normal stop" };
        if let Err(e) = self
            .simulator
            .stop(&pile_id, &request.user_id.to_string(), reason)
            .await
        {
            warn!(error = %e, pile_id, "stop RPC failed, finalising locally");
        }

        let session = match self.storage.latest_session_for_request(request_id).await {
            Ok(Some(s)) if s.is_active() => s,
            _ => {
                warn!(%request_id, "no active session to stop");
                return;
            }
        };
        let mut session = session;
        session.close(Utc::now());
        if let Err(e) = self.storage.update_session(session.clone()).await {
            error!(error = %e, "cannot close session");
            return;
        }

        let final_status = if cancel {
            RequestStatus::Cancelled
        } else {
            RequestStatus::Completed
        };
        if let Err(e) = self
            .storage
            .update_request_status(request_id, final_status)
            .await
        {
            error!(error = %e, %request_id, "cannot finalise request");
        }
        let _ = self.storage.remove_queue_entry(request_id).await;

        if let Err(e) = self.release_pile_slot(&pile_id, &session).await {
            error!(error = %e, pile_id, "cannot release pile slot");
        }

        if let Err(e) = self.billing.generate_bill(session.id).await {
            error!(error = %e, session_id = %session.id, "bill generation failed");
        }

        self.renumber_and_promote(&pile_id).await;
        info!(%request_id, pile_id, cancel, "charging stopped");

        self.try_schedule();
    }

    /// Return the pile to AVAILABLE, shrink its queue and credit the session
    /// to its cumulative counters.
    async fn release_pile_slot(
        &self,
        pile_id: &str,
        session: &ChargingSession,
    ) -> DomainResult<()> {
        self.storage
            .update_pile_status(pile_id, PileStatus::Available)
            .await?;
        let pile = self
            .storage
            .get_pile(pile_id)
            .await?
            .ok_or_else(|| DomainError::not_found("pile", pile_id))?;
        self.storage
            .update_pile_queue_length(pile_id, pile.queue_length.saturating_sub(1))
            .await?;
        self.storage
            .add_pile_stats(pile_id, 1, session.duration_hours(), session.actual_capacity)
            .await?;
        Ok(())
    }

    /// Re-pack queue positions to `1..k` and start the new head if present.
    async fn renumber_and_promote(&self, pile_id: &str) {
        let entries = match self.storage.queue_entries(pile_id).await {
            Ok(e) => e,
            Err(e) => {
                error!(error = %e, pile_id, "cannot renumber queue");
                return;
            }
        };
        for (i, entry) in entries.iter().enumerate() {
            let new_position = (i + 1) as u32;
            if entry.position != new_position {
                let _ = self
                    .storage
                    .update_entry_position(entry.request_id, new_position)
                    .await;
            }
            // keep the request row in sync without clobbering a charging head
            if let Ok(Some(request)) = self.storage.get_request(entry.request_id).await {
                if request.status == RequestStatus::Queued
                    && request.queue_position != new_position
                {
                    let _ = self
                        .storage
                        .assign_request(
                            entry.request_id,
                            Some(pile_id.to_string()),
                            new_position,
                            0,
                            RequestStatus::Queued,
                        )
                        .await;
                }
            }
            if new_position == 1 {
                self.start_charging(entry.request_id, pile_id).await;
            }
        }
    }
}

fn to_candidates(requests: &[ChargingRequest]) -> Vec<Candidate> {
    requests
        .iter()
        .map(|r| Candidate {
            request_id: r.id,
            mode: r.charging_mode,
            requested_capacity: r.requested_capacity,
            ticket_seq: r.ticket_seq(),
        })
        .collect()
}

#[async_trait::async_trait]
impl Scheduler for SchedulerService {
    fn try_schedule(&self) {
        // coalescing: a full channel already has a round pending
        let _ = self.schedule_tx.try_send(());
    }

    async fn stop_charging(&self, request_id: Uuid, cancel: bool) -> DomainResult<()> {
        self.stop_tx
            .send(StopCommand { request_id, cancel })
            .await
            .map_err(|_| DomainError::Downstream("scheduler is not running".into()))
    }
}

// ── Tests ──────────────────────────────────────────────────────
