//! End-to-end scenarios: admission through dispatch, charging, fault rescue,
//! recovery rebalancing and billing, against the in-memory store and a
//! deterministic simulator double.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use chargegrid::application::bootstrap::initialize_station;
use chargegrid::application::{
    BillingService, PileService, RequestService, Scheduler, SchedulerService, SimulatorClient,
};
use chargegrid::domain::{
    ChargingMode, DomainError, DomainResult, FaultType, PileStatus, RequestStatus, SessionStatus,
    TariffPeriod,
};
use chargegrid::shared::shutdown::ShutdownSignal;
use chargegrid::{AppConfig, InMemoryStorage, Storage};

/// Simulator double returning a configurable fixed start time.
struct ScriptedSimulator {
    start_time: Mutex<DateTime<Utc>>,
    fail_assign: AtomicBool,
    assigns: Mutex<Vec<(String, String, f64, ChargingMode)>>,
    stops: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedSimulator {
    fn new(start_time: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Mutex::new(start_time),
            fail_assign: AtomicBool::new(false),
            assigns: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
        })
    }

    fn set_start_time(&self, t: DateTime<Utc>) {
        *self.start_time.lock().unwrap() = t;
    }
}

#[async_trait]
impl SimulatorClient for ScriptedSimulator {
    async fn assign(
        &self,
        pile_id: &str,
        user_id: &str,
        requested_capacity: f64,
        mode: ChargingMode,
    ) -> DomainResult<DateTime<Utc>> {
        if self.fail_assign.load(Ordering::SeqCst) {
            return Err(DomainError::Downstream("simulator unreachable".into()));
        }
        self.assigns.lock().unwrap().push((
            pile_id.to_string(),
            user_id.to_string(),
            requested_capacity,
            mode,
        ));
        Ok(*self.start_time.lock().unwrap())
    }

    async fn stop(&self, pile_id: &str, user_id: &str, reason: &str) -> DomainResult<()> {
        self.stops.lock().unwrap().push((
            pile_id.to_string(),
            user_id.to_string(),
            reason.to_string(),
        ));
        Ok(())
    }
}

struct Station {
    storage: Arc<dyn Storage>,
    simulator: Arc<ScriptedSimulator>,
    scheduler: Arc<SchedulerService>,
    requests: Arc<RequestService>,
    billing: Arc<BillingService>,
    piles: PileService,
}

/// Tariffs used throughout: peak [18, 21) at 1.0, normal elsewhere at 0.7,
/// service fee 0.8 everywhere.
fn station_config(fast: u32, slow: u32, waiting: u32, queue_len: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.station.fast_pile_count = fast;
    config.station.slow_pile_count = slow;
    config.station.waiting_area_size = waiting;
    config.station.charging_queue_len = queue_len;
    config.pricing.peak_price = 1.0;
    config.pricing.normal_price = 0.7;
    config.pricing.service_fee = 0.8;
    config.pricing.peak_hours = vec![[18, 21]];
    config.pricing.normal_hours = vec![[0, 18], [21, 24]];
    config.pricing.valley_hours = vec![];
    config
}

async fn station(config: AppConfig) -> Station {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    initialize_station(&storage, &config).await.unwrap();

    let simulator = ScriptedSimulator::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 2).unwrap());
    let requests = Arc::new(RequestService::new(storage.clone()).await.unwrap());
    let billing = Arc::new(BillingService::new(storage.clone()));
    let scheduler = SchedulerService::new(storage.clone(), simulator.clone(), billing.clone());
    requests.set_scheduler(scheduler.clone() as Arc<dyn Scheduler>);

    Station {
        piles: PileService::new(storage.clone()),
        storage,
        simulator,
        scheduler,
        requests,
        billing,
    }
}

#[tokio::test]
async fn normal_fast_charge_produces_expected_bill() {
    let station = station(station_config(2, 0, 6, 2)).await;
    let u1 = Uuid::new_v4();

    let request = station
        .requests
        .submit(u1, ChargingMode::Fast, 15.0)
        .await
        .unwrap();
    assert_eq!(request.queue_number, "F1");
    assert_eq!(request.status, RequestStatus::Waiting);

    station.scheduler.execute_schedule().await;

    // assigned to F1 at position 1 and sent to the simulator
    let request = station
        .storage
        .get_request(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.pile_id.as_deref(), Some("F1"));
    assert_eq!(request.queue_position, 1);
    assert_eq!(request.status, RequestStatus::Charging);
    {
        let assigns = station.simulator.assigns.lock().unwrap();
        assert_eq!(assigns.len(), 1);
        assert_eq!(assigns[0].0, "F1");
        assert_eq!(assigns[0].2, 15.0);
        assert_eq!(assigns[0].3, ChargingMode::Fast);
    }

    // the session carries the simulator's authoritative start time
    let session = station
        .storage
        .active_session_for_pile("F1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        session.start_time,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 2).unwrap()
    );

    // completion after half an hour at full energy
    let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 2).unwrap();
    station
        .scheduler
        .complete_charging("F1", u1, end, 15.0, 1800)
        .await
        .unwrap();

    let bill = station
        .storage
        .bill_for_session(session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bill.charging_duration, 0.5);
    assert_eq!(bill.price_type, TariffPeriod::Normal);
    assert_eq!(bill.unit_price, 0.7);
    assert_eq!(bill.charging_fee, 10.5);
    assert_eq!(bill.service_fee, 12.0);
    assert_eq!(bill.total_fee, 22.5);

    let pile = station.storage.get_pile("F1").await.unwrap().unwrap();
    assert_eq!(pile.status, PileStatus::Available);
    assert_eq!(pile.total_sessions, 1);
    assert_eq!(pile.total_energy, 15.0);
}

#[tokio::test]
async fn slow_charge_across_tariff_boundary() {
    let station = station(station_config(0, 1, 6, 2)).await;
    let u2 = Uuid::new_v4();
    station
        .simulator
        .set_start_time(Utc.with_ymd_and_hms(2024, 5, 1, 17, 30, 0).unwrap());

    station
        .requests
        .submit(u2, ChargingMode::Slow, 7.0)
        .await
        .unwrap();
    station.scheduler.execute_schedule().await;

    let end = Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();
    station
        .scheduler
        .complete_charging("T1", u2, end, 7.0, 3600)
        .await
        .unwrap();

    let bills = station.billing.bills_for_user(u2).await.unwrap();
    assert_eq!(bills.len(), 1);
    let bill = &bills[0];
    assert_eq!(bill.segments.len(), 2);
    assert_eq!(bill.charging_fee, 5.95);
    assert_eq!(bill.service_fee, 5.6);
    assert_eq!(bill.total_fee, 11.55);
    // equal halves: the tie breaks toward peak
    assert_eq!(bill.price_type, TariffPeriod::Peak);
}

#[tokio::test]
async fn waiting_area_rejects_when_full() {
    let station = station(station_config(0, 0, 2, 2)).await;
    // no piles: everyone stays in the waiting area

    station
        .requests
        .submit(Uuid::new_v4(), ChargingMode::Fast, 10.0)
        .await
        .unwrap();
    station
        .requests
        .submit(Uuid::new_v4(), ChargingMode::Fast, 10.0)
        .await
        .unwrap();

    let err = station
        .requests
        .submit(Uuid::new_v4(), ChargingMode::Fast, 10.0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AreaFull));
}

#[tokio::test]
async fn pile_fault_rescues_queue_and_bills_partial_session() {
    let station = station(station_config(2, 0, 6, 2)).await;
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

    // u1 starts charging on F1; F2 is parked offline so u2 queues behind u1
    let r1 = station
        .requests
        .submit(u1, ChargingMode::Fast, 20.0)
        .await
        .unwrap();
    station.scheduler.execute_schedule().await;
    station
        .piles
        .control("F2", chargegrid::application::PileAction::Stop)
        .await
        .unwrap();
    let r2 = station
        .requests
        .submit(u2, ChargingMode::Fast, 10.0)
        .await
        .unwrap();
    station.scheduler.execute_schedule().await;
    station
        .piles
        .control("F2", chargegrid::application::PileAction::Start)
        .await
        .unwrap();

    station
        .scheduler
        .update_progress("F1", u1, 5.0, Utc::now())
        .await
        .unwrap();

    station
        .scheduler
        .handle_pile_fault("F1", FaultType::Hardware, "contactor welded")
        .await
        .unwrap();

    let f1 = station.storage.get_pile("F1").await.unwrap().unwrap();
    assert_eq!(f1.status, PileStatus::Fault);
    assert_eq!(f1.queue_length, 0);

    // u1 resumes with the undelivered 15 kWh; u2 keeps its capacity
    let r1 = station.storage.get_request(r1.id).await.unwrap().unwrap();
    assert_eq!(r1.requested_capacity, 15.0);
    assert_eq!(r1.pile_id.as_deref(), Some("F2"));
    assert_eq!(r1.queue_position, 1);
    let r2 = station.storage.get_request(r2.id).await.unwrap().unwrap();
    assert_eq!(r2.requested_capacity, 10.0);
    assert_eq!(r2.pile_id.as_deref(), Some("F2"));
    assert_eq!(r2.queue_position, 2);

    // the interrupted session got a partial bill over 5 kWh
    let session = station
        .storage
        .latest_session_for_pile_user("F1", u1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Interrupted);
    let bill = station
        .storage
        .bill_for_session(session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bill.charging_capacity, 5.0);
}

#[tokio::test]
async fn recovery_triggers_rebalance_and_resumes_admission() {
    let station = station(station_config(2, 0, 6, 2)).await;

    station
        .scheduler
        .handle_pile_fault("F1", FaultType::Power, "feeder trip")
        .await
        .unwrap();

    let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let r1 = station
        .requests
        .submit(u1, ChargingMode::Fast, 20.0)
        .await
        .unwrap();
    let r2 = station
        .requests
        .submit(u2, ChargingMode::Fast, 15.0)
        .await
        .unwrap();
    let r3 = station
        .requests
        .submit(u3, ChargingMode::Fast, 10.0)
        .await
        .unwrap();
    station.scheduler.execute_schedule().await;

    // everything stacked on the surviving pile; u3 left waiting
    assert_eq!(
        station
            .storage
            .get_request(r1.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        RequestStatus::Charging
    );
    assert_eq!(
        station
            .storage
            .get_request(r3.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        RequestStatus::Waiting
    );

    station.scheduler.handle_pile_recovery("F1").await.unwrap();
    assert!(!station.scheduler.waiting_area_locked());

    // the queued vehicle moved to the recovered pile and started charging
    let r2 = station.storage.get_request(r2.id).await.unwrap().unwrap();
    assert_eq!(r2.pile_id.as_deref(), Some("F1"));
    assert_eq!(r2.status, RequestStatus::Charging);

    // the follow-up tick admits the waiting vehicle
    station.scheduler.execute_schedule().await;
    let r3 = station.storage.get_request(r3.id).await.unwrap().unwrap();
    assert_eq!(r3.status, RequestStatus::Queued);

    let fault = &station.storage.list_faults().await.unwrap()[0];
    assert!(fault.recovered_at.is_some());
}

#[tokio::test]
async fn cancel_while_charging_goes_through_stop_stream() {
    let station = station(station_config(1, 0, 6, 2)).await;
    let shutdown = ShutdownSignal::new();
    station.scheduler.start(shutdown.clone());

    let u1 = Uuid::new_v4();
    let request = station
        .requests
        .submit(u1, ChargingMode::Fast, 20.0)
        .await
        .unwrap();

    // the loop picks up the admission tick
    wait_until(|| async {
        station
            .storage
            .get_request(request.id)
            .await
            .unwrap()
            .unwrap()
            .status
            == RequestStatus::Charging
    })
    .await;

    station
        .scheduler
        .update_progress("F1", u1, 8.0, Utc::now())
        .await
        .unwrap();
    station.requests.cancel(u1, request.id).await.unwrap();

    wait_until(|| async {
        station
            .storage
            .get_request(request.id)
            .await
            .unwrap()
            .unwrap()
            .status
            == RequestStatus::Cancelled
    })
    .await;

    let session = station
        .storage
        .latest_session_for_request(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Interrupted);
    assert_eq!(session.actual_capacity, 8.0);
    assert!(station
        .storage
        .bill_for_session(session.id)
        .await
        .unwrap()
        .is_some());
    assert_eq!(station.simulator.stops.lock().unwrap().len(), 1);

    // the slot is free again
    let pile = station.storage.get_pile("F1").await.unwrap().unwrap();
    assert_eq!(pile.status, PileStatus::Available);

    shutdown.trigger();
}

#[tokio::test]
async fn user_can_resubmit_after_completion() {
    let station = station(station_config(1, 0, 6, 2)).await;
    let u1 = Uuid::new_v4();

    let first = station
        .requests
        .submit(u1, ChargingMode::Fast, 10.0)
        .await
        .unwrap();
    station.scheduler.execute_schedule().await;

    let err = station
        .requests
        .submit(u1, ChargingMode::Fast, 5.0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::UserBusy(_)));

    let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 2).unwrap();
    station
        .scheduler
        .complete_charging("F1", u1, end, 10.0, 1200)
        .await
        .unwrap();

    let second = station
        .requests
        .submit(u1, ChargingMode::Fast, 5.0)
        .await
        .unwrap();
    // tickets keep counting monotonically
    assert_eq!(first.queue_number, "F1");
    assert_eq!(second.queue_number, "F2");
}

async fn wait_until<F, Fut>(mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if probe().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 2s");
}
