//! Station bootstrap: seed piles, scheduling parameters and pricing
//! windows into the store at startup.

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::domain::{ChargingPile, DomainResult, PileType};
use crate::infrastructure::Storage;

/// Sync configuration into the store and make sure every configured pile
/// exists. Existing piles keep their status and counters; restarts only add
/// piles that are missing.
pub async fn initialize_station(storage: &Arc<dyn Storage>, config: &AppConfig) -> DomainResult<()> {
    storage
        .set_scheduling_config(config.station.scheduling_config())
        .await?;
    storage
        .set_tariff_windows(config.pricing.tariff_windows())
        .await?;

    let mut created = 0;
    for i in 1..=config.station.fast_pile_count {
        let id = format!("{}{}", PileType::Fast.prefix(), i);
        if storage.get_pile(&id).await?.is_none() {
            storage
                .save_pile(ChargingPile::new(
                    id.as_str(),
                    PileType::Fast,
                    config.station.fast_power,
                ))
                .await?;
            created += 1;
        }
    }
    for i in 1..=config.station.slow_pile_count {
        let id = format!("{}{}", PileType::Slow.prefix(), i);
        if storage.get_pile(&id).await?.is_none() {
            storage
                .save_pile(ChargingPile::new(
                    id.as_str(),
                    PileType::Slow,
                    config.station.slow_power,
                ))
                .await?;
            created += 1;
        }
    }

    info!(
        fast = config.station.fast_pile_count,
        slow = config.station.slow_pile_count,
        created, "station initialized"
    );
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::PileStatus;
    use crate::infrastructure::InMemoryStorage;

    #[tokio::test]
    async fn creates_configured_piles() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let config = AppConfig::default();

        initialize_station(&storage, &config).await.unwrap();

        let piles = storage.list_piles().await.unwrap();
        assert_eq!(piles.len(), 5);
        assert!(piles.iter().any(|p| p.id == "F1"));
        assert!(piles.iter().any(|p| p.id == "T3"));
        assert!(piles.iter().all(|p| p.status == PileStatus::Available));

        let sched = storage.scheduling_config().await.unwrap();
        assert_eq!(sched.waiting_area_size, 6);
        assert_eq!(storage.tariff_windows().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn rerun_keeps_existing_pile_state() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let config = AppConfig::default();
        initialize_station(&storage, &config).await.unwrap();

        storage
            .add_pile_stats("F1", 3, 2.5, 40.0)
            .await
            .unwrap();
        storage
            .update_pile_status("T1", PileStatus::Maintenance)
            .await
            .unwrap();

        initialize_station(&storage, &config).await.unwrap();

        let f1 = storage.get_pile("F1").await.unwrap().unwrap();
        assert_eq!(f1.total_sessions, 3);
        let t1 = storage.get_pile("T1").await.unwrap().unwrap();
        assert_eq!(t1.status, PileStatus::Maintenance);
    }
}
