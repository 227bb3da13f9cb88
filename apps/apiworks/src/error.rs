//! # Boundary Errors
//!
//! [`ApiError`] carries the codes a client can observe. Engine failures are
//! folded onto them here; internal failures are logged with their cause and
//! answered with a generic message.

use apiworks_core::{EngineError, StoreError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("internal error")]
    Internal,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wire code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission-denied",
            Self::NotFound(_) => "not-found",
            Self::InvalidArgument(_) => "invalid-argument",
            Self::Internal => "internal",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            // nginx's "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation { .. } => Self::InvalidArgument(err.to_string()),
            EngineError::NotFound { .. } => Self::NotFound(err.to_string()),
            EngineError::PermissionDenied => Self::PermissionDenied,
            EngineError::Cancelled => Self::Cancelled,
            EngineError::Timeout => Self::DeadlineExceeded,
            EngineError::Format(ref format) => {
                tracing::debug!(error = %format, "rejecting undecodable bundle");
                Self::InvalidArgument(err.to_string())
            }
            // The taken row may sit in a workspace the caller cannot see, so
            // neither its kind nor its ID goes back on the wire.
            EngineError::Storage(StoreError::Conflict { table, id }) => {
                tracing::debug!(table, %id, "insert rejected on a taken id");
                Self::InvalidArgument("id already in use".to_string())
            }
            EngineError::Crypto(_) => {
                tracing::error!("credential secret failed to open or seal");
                Self::Internal
            }
            EngineError::Invariant(_) | EngineError::Storage(_) => {
                tracing::error!(error = %err, "internal failure");
                Self::Internal
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        EngineError::from(err).into()
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Process-level failures of the CLI and server startup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Engine(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiworks_core::{Id, VaultError};

    #[test]
    fn engine_errors_map_to_boundary_codes() {
        let cases = [
            (EngineError::validation("name", "empty"), "invalid-argument"),
            (EngineError::NotFound { kind: "credential", id: Id::NIL }, "not-found"),
            (EngineError::PermissionDenied, "permission-denied"),
            (EngineError::Timeout, "deadline-exceeded"),
            (EngineError::Cancelled, "cancelled"),
            (EngineError::invariant("no start"), "internal"),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code(), code);
        }
    }

    #[test]
    fn crypto_failures_do_not_leak_detail() {
        let err = ApiError::from(EngineError::Crypto(VaultError::AuthFailed));
        assert_eq!(err, ApiError::Internal);
        assert_eq!(err.to_string(), "internal error");
    }

    #[test]
    fn id_conflicts_name_neither_kind_nor_id() {
        let id = Id::new_now();
        let err = ApiError::from(StoreError::Conflict { table: "credential", id });
        assert_eq!(err.code(), "invalid-argument");
        let message = err.to_string();
        assert!(!message.contains("credential"));
        assert!(!message.contains(&id.to_string()));
    }
}
