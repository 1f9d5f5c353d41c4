//! Mapping of domain errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::dto::ApiResponse;
use crate::domain::DomainError;

/// Wrapper turning a [`DomainError`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::AreaFull
            | DomainError::UserBusy(_)
            | DomainError::PileFull(_)
            | DomainError::NotWaiting(_)
            | DomainError::TerminalState(_) => StatusCode::CONFLICT,
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Inconsistency(_) | DomainError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DomainError::Downstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()>::error(status.as_u16(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn policy_rejections_are_conflicts() {
        assert_eq!(ApiError(DomainError::AreaFull).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError(DomainError::UserBusy(Uuid::new_v4())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(DomainError::TerminalState(Uuid::new_v4())).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn report_mismatch_is_server_error() {
        assert_eq!(
            ApiError(DomainError::Inconsistency("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn lookup_and_ownership_mappings() {
        assert_eq!(
            ApiError(DomainError::not_found("pile", "F9")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(DomainError::Forbidden("x".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError(DomainError::Validation("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(DomainError::Downstream("x".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
