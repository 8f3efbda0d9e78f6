//! Error types for the registry API.
//!
//! [`ApiError`] maps registry failures onto HTTP statuses and renders them
//! as `{"message": ..., "status": ...}` via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use robotlog_store::RegistryError;

/// Message returned for reads against an unknown robot.
pub const ROBOT_NOT_FOUND: &str = "Robot not found";

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The robot has never been written.
    #[error("Robot not found")]
    NotFound,

    /// The request cannot be served as given.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Concurrent writers to the same robot kept conflicting.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store is unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Any other failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status this error is reported with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::NotFound,
            RegistryError::InvalidName(e) => Self::BadRequest(e.to_string()),
            e @ RegistryError::ConflictRetryExhausted { .. } => Self::Conflict(e.to_string()),
            RegistryError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Store unavailable");
                Self::Unavailable(String::from("store unavailable"))
            }
            RegistryError::Store(e) => {
                tracing::error!(error = %e, "Store error");
                Self::Internal(String::from("store error"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound => String::from(ROBOT_NOT_FOUND),
            Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::Unavailable(msg)
            | Self::Internal(msg) => msg,
        };

        let body = serde_json::json!({
            "message": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use robotlog_core::NameError;
    use robotlog_store::DbError;

    use super::*;

    #[test]
    fn registry_errors_map_to_statuses() {
        let cases = [
            (RegistryError::NotFound(String::from("x")), StatusCode::NOT_FOUND),
            (RegistryError::InvalidName(NameError::Empty), StatusCode::BAD_REQUEST),
            (
                RegistryError::ConflictRetryExhausted {
                    name: String::from("x"),
                    attempts: 4,
                },
                StatusCode::CONFLICT,
            ),
            (
                RegistryError::StoreUnavailable(DbError::Config(String::from("down"))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RegistryError::Store(DbError::InvalidRow(String::from("bad"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn store_details_are_not_leaked() {
        let err = ApiError::from(RegistryError::Store(DbError::InvalidRow(String::from(
            "audit 7: unknown action",
        ))));
        assert!(matches!(err, ApiError::Internal(ref msg) if msg == "store error"));
    }
}
