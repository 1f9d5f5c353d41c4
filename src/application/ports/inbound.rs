//! Inbound port: the narrow scheduler interface exposed to the request
//! service.
//!
//! The request service is constructed first, the scheduler second, and this
//! handle is injected afterwards, breaking the construction cycle between
//! the two.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::DomainResult;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Non-blocking scheduling tick. Multiple ticks posted before the core
    /// picks them up coalesce into one round.
    fn try_schedule(&self);

    /// Stop the charging session of a request; `cancel` marks the request
    /// cancelled instead of completed.
    async fn stop_charging(&self, request_id: Uuid, cancel: bool) -> DomainResult<()>;
}
