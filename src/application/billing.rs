//! Billing service: turns terminal sessions into frozen bills.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::application::tariff::TariffTable;
use crate::domain::{BillingDetail, DomainError, DomainResult, TariffPeriod};
use crate::infrastructure::Storage;

/// Round a monetary/aggregate value to 0.01. Applied at bill emission only,
/// never during segment aggregation, to avoid drift in multi-segment totals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct BillingService {
    storage: Arc<dyn Storage>,
}

impl BillingService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Generate the bill for a session. Exactly one bill exists per session:
    /// repeated calls return the stored bill unchanged.
    pub async fn generate_bill(&self, session_id: Uuid) -> DomainResult<BillingDetail> {
        let session = self
            .storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("session", session_id))?;

        if let Some(existing) = self.storage.bill_for_session(session_id).await? {
            return Ok(existing);
        }

        let end_time = session.end_time.unwrap_or_else(Utc::now);
        let windows = self.storage.tariff_windows().await?;
        let table = TariffTable::new(&windows);

        let segments = table.split(session.start_time, end_time, session.actual_capacity);
        let dominant = TariffTable::dominant_period(&segments);

        let mut charging_fee = 0.0;
        let mut service_fee = 0.0;
        let mut hours = [0.0f64; 3];
        let mut energy = [0.0f64; 3];
        for seg in &segments {
            charging_fee += seg.electric_cost;
            service_fee += seg.service_cost;
            let slot = seg.period.rank() as usize;
            hours[slot] += seg.duration_hours;
            energy[slot] += seg.energy;
        }

        let charging_fee = round2(charging_fee);
        let service_fee = round2(service_fee);
        let total_fee = round2(charging_fee + service_fee);

        let bill = BillingDetail {
            id: Uuid::new_v4(),
            session_id,
            user_id: session.user_id,
            pile_id: session.pile_id.clone(),
            charging_capacity: round2(session.actual_capacity),
            charging_duration: round2((end_time - session.start_time).num_seconds() as f64 / 3600.0),
            start_time: session.start_time,
            end_time,
            unit_price: table.unit_price(dominant),
            price_type: dominant,
            charging_fee,
            service_fee,
            total_fee,
            peak_hours: hours[TariffPeriod::Peak.rank() as usize],
            normal_hours: hours[TariffPeriod::Normal.rank() as usize],
            valley_hours: hours[TariffPeriod::Valley.rank() as usize],
            peak_energy: energy[TariffPeriod::Peak.rank() as usize],
            normal_energy: energy[TariffPeriod::Normal.rank() as usize],
            valley_energy: energy[TariffPeriod::Valley.rank() as usize],
            segments,
            generated_at: Utc::now(),
        };

        let bill = self.storage.insert_bill(bill).await?;
        info!(
            session_id = %session_id,
            pile_id = %bill.pile_id,
            capacity = bill.charging_capacity,
            total = bill.total_fee,
            period = %bill.price_type,
            "bill generated"
        );
        Ok(bill)
    }

    pub async fn get_bill(&self, id: Uuid) -> DomainResult<BillingDetail> {
        self.storage
            .get_bill(id)
            .await?
            .ok_or_else(|| DomainError::not_found("bill", id))
    }

    pub async fn bill_for_session(&self, session_id: Uuid) -> DomainResult<Option<BillingDetail>> {
        self.storage.bill_for_session(session_id).await
    }

    pub async fn bills_for_user(&self, user_id: Uuid) -> DomainResult<Vec<BillingDetail>> {
        self.storage.bills_for_user(user_id).await
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::domain::{ChargingSession, TariffWindow};
    use crate::infrastructure::InMemoryStorage;

    fn evening_peak_windows() -> Vec<TariffWindow> {
        vec![
            TariffWindow {
                period: TariffPeriod::Normal,
                start_hour: 0,
                end_hour: 24,
                electric_fee: 0.7,
                service_fee: 0.8,
            },
            TariffWindow {
                period: TariffPeriod::Peak,
                start_hour: 18,
                end_hour: 21,
                electric_fee: 1.0,
                service_fee: 0.8,
            },
        ]
    }

    async fn seeded() -> (Arc<InMemoryStorage>, BillingService) {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .set_tariff_windows(evening_peak_windows())
            .await
            .unwrap();
        let billing = BillingService::new(storage.clone());
        (storage, billing)
    }

    #[tokio::test]
    async fn single_period_bill() {
        let (storage, billing) = seeded().await;
        let start = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 2).unwrap();
        let end = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 2).unwrap();
        let mut session = ChargingSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "F1",
            "F1",
            15.0,
            start,
        );
        session.record_progress(15.0, end);
        session.close(end);
        let session = storage.create_session(session).await.unwrap();

        let bill = billing.generate_bill(session.id).await.unwrap();
        assert_eq!(bill.price_type, TariffPeriod::Normal);
        assert_eq!(bill.unit_price, 0.7);
        assert_eq!(bill.charging_duration, 0.5);
        assert_eq!(bill.charging_fee, 10.5);
        assert_eq!(bill.service_fee, 12.0);
        assert_eq!(bill.total_fee, 22.5);
    }

    #[tokio::test]
    async fn cross_period_bill_with_peak_tiebreak() {
        let (storage, billing) = seeded().await;
        let start = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 17, 30, 0).unwrap();
        let end = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();
        let mut session = ChargingSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "T1",
            "T1",
            7.0,
            start,
        );
        session.record_progress(7.0, end);
        session.close(end);
        let session = storage.create_session(session).await.unwrap();

        let bill = billing.generate_bill(session.id).await.unwrap();
        assert_eq!(bill.segments.len(), 2);
        assert_eq!(bill.charging_fee, 5.95);
        assert_eq!(bill.service_fee, 5.6);
        assert_eq!(bill.total_fee, 11.55);
        // half the time normal, half peak: tie breaks toward peak
        assert_eq!(bill.price_type, TariffPeriod::Peak);
        assert_eq!(bill.unit_price, 1.0);
        assert!((bill.peak_energy - 3.5).abs() < 1e-9);
        assert!((bill.normal_energy - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn bill_generation_is_idempotent() {
        let (storage, billing) = seeded().await;
        let start = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let end = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let mut session = ChargingSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "F1",
            "F2",
            10.0,
            start,
        );
        session.record_progress(10.0, end);
        session.close(end);
        let session = storage.create_session(session).await.unwrap();

        let first = billing.generate_bill(session.id).await.unwrap();
        let second = billing.generate_bill(session.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.total_fee, second.total_fee);
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let (_, billing) = seeded().await;
        let err = billing.generate_bill(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(2.444), 2.44);
        assert_eq!(round2(2.446), 2.45);
        assert_eq!(round2(10.5), 10.5);
        assert_eq!(round2(0.0), 0.0);
    }
}
