//! Pile service: status views, admin control actions and fault records.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::{
    ChargingPile, DomainError, DomainResult, FaultRecord, PileStatus, QueueEntry,
};
use crate::infrastructure::Storage;

/// Admin control actions on a pile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PileAction {
    Start,
    Stop,
    Maintenance,
}

impl PileAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }

    fn target_status(&self) -> PileStatus {
        match self {
            Self::Start => PileStatus::Available,
            Self::Stop => PileStatus::Offline,
            Self::Maintenance => PileStatus::Maintenance,
        }
    }
}

/// Pile detail with the current vehicle and its queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PileView {
    #[serde(flatten)]
    pub pile: ChargingPile,
    pub current_vehicle: Option<QueueEntry>,
    pub queue: Vec<QueueEntry>,
}

pub struct PileService {
    storage: Arc<dyn Storage>,
}

impl PileService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn list(&self) -> DomainResult<Vec<PileView>> {
        let piles = self.storage.list_piles().await?;
        let mut views = Vec::with_capacity(piles.len());
        for pile in piles {
            views.push(self.view_of(pile).await?);
        }
        Ok(views)
    }

    pub async fn get(&self, id: &str) -> DomainResult<PileView> {
        let pile = self
            .storage
            .get_pile(id)
            .await?
            .ok_or_else(|| DomainError::not_found("pile", id))?;
        self.view_of(pile).await
    }

    async fn view_of(&self, pile: ChargingPile) -> DomainResult<PileView> {
        let mut entries = self.storage.queue_entries(&pile.id).await?;
        let current = if entries.first().map(|e| e.started_at.is_some()) == Some(true) {
            Some(entries.remove(0))
        } else {
            None
        };
        Ok(PileView {
            pile,
            current_vehicle: current,
            queue: entries,
        })
    }

    /// Apply an admin control action. `start` brings the pile back to
    /// service, `stop` takes it offline, `maintenance` parks it for service
    /// work.
    pub async fn control(&self, id: &str, action: PileAction) -> DomainResult<ChargingPile> {
        let pile = self
            .storage
            .get_pile(id)
            .await?
            .ok_or_else(|| DomainError::not_found("pile", id))?;

        let target = action.target_status();
        if pile.status == PileStatus::Occupied && action != PileAction::Start {
            return Err(DomainError::Validation(format!(
                "pile {} is charging; stop the session first",
                id
            )));
        }

        self.storage.update_pile_status(id, target).await?;
        info!(pile_id = id, status = %target, "pile status changed by operator");

        self.storage
            .get_pile(id)
            .await?
            .ok_or_else(|| DomainError::not_found("pile", id))
    }

    pub async fn fault_records(&self) -> DomainResult<Vec<FaultRecord>> {
        self.storage.list_faults().await
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::PileType;
    use crate::infrastructure::InMemoryStorage;

    async fn service_with_pile(status: PileStatus) -> (Arc<InMemoryStorage>, PileService) {
        let storage = Arc::new(InMemoryStorage::new());
        let mut pile = ChargingPile::new("F1", PileType::Fast, 30.0);
        pile.status = status;
        storage.save_pile(pile).await.unwrap();
        (storage.clone(), PileService::new(storage))
    }

    #[test]
    fn action_parsing() {
        assert_eq!(PileAction::parse("start"), Some(PileAction::Start));
        assert_eq!(PileAction::parse("stop"), Some(PileAction::Stop));
        assert_eq!(
            PileAction::parse("maintenance"),
            Some(PileAction::Maintenance)
        );
        assert_eq!(PileAction::parse("reboot"), None);
    }

    #[tokio::test]
    async fn stop_takes_pile_offline() {
        let (_, svc) = service_with_pile(PileStatus::Available).await;
        let pile = svc.control("F1", PileAction::Stop).await.unwrap();
        assert_eq!(pile.status, PileStatus::Offline);
    }

    #[tokio::test]
    async fn maintenance_round_trip() {
        let (_, svc) = service_with_pile(PileStatus::Available).await;
        let pile = svc.control("F1", PileAction::Maintenance).await.unwrap();
        assert_eq!(pile.status, PileStatus::Maintenance);
        let pile = svc.control("F1", PileAction::Start).await.unwrap();
        assert_eq!(pile.status, PileStatus::Available);
    }

    #[tokio::test]
    async fn occupied_pile_rejects_stop() {
        let (_, svc) = service_with_pile(PileStatus::Occupied).await;
        let err = svc.control("F1", PileAction::Stop).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_pile_is_not_found() {
        let (_, svc) = service_with_pile(PileStatus::Available).await;
        let err = svc.control("F9", PileAction::Start).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
