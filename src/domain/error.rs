//! Domain errors

use thiserror::Error;
use uuid::Uuid;

/// Domain-level error taxonomy.
///
/// Validation and policy rejections surface to the caller as 4xx; downstream
/// and storage failures are logged and surface as 5xx only when the operation
/// cannot proceed at all.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("The waiting area is full")]
    AreaFull,

    #[error("User {0} already has an active charging request")]
    UserBusy(Uuid),

    #[error("Pile {0} has no free queue slot")]
    PileFull(String),

    #[error("Request {0} is not in the waiting area")]
    NotWaiting(Uuid),

    #[error("Request {0} is already completed or cancelled")]
    TerminalState(Uuid),

    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A progress/completion report that does not match an active session.
    #[error("Inconsistent report: {0}")]
    Inconsistency(String),

    /// Simulator RPC failure.
    #[error("Simulator call failed: {0}")]
    Downstream(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
