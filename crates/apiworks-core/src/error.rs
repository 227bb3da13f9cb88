//! # Engine Errors
//!
//! The umbrella error for export, import, filter and layout operations.
//!
//! - Validation: malformed input found before any I/O (carries the field)
//! - NotFound: a row that must exist does not
//! - Invariant: bundle corruption (missing start node, payload/kind mismatch,
//!   broken delta chain)
//! - Crypto / Storage / Format: wrapped lower-layer failures
//!
//! The boundary (the app crate) maps these onto RPC error codes.

use crate::filter::FilterError;
use crate::formats::FormatError;
use crate::id::Id;
use crate::mapper::MapperError;
use crate::storage::StoreError;
use crate::vault::VaultError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input detected before any I/O.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// A required row does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Id },

    /// The principal may not act on the target workspace.
    #[error("permission denied")]
    PermissionDenied,

    /// The bundle or store violates a structural invariant.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] VaultError),

    /// The operation observed its cancel flag.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation ran past its deadline.
    #[error("operation timed out")]
    Timeout,

    #[error(transparent)]
    Storage(StoreError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl EngineError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { table, id } => Self::NotFound { kind: table, id },
            other => Self::Storage(other),
        }
    }
}

impl From<FilterError> for EngineError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::EmptySelection => Self::validation("filter", err.to_string()),
            FilterError::NoMatchingExamples(id) => Self::NotFound { kind: "example", id },
            FilterError::NoMatchingFlows(id) => Self::NotFound { kind: "flow", id },
            FilterError::MissingStart(_) => Self::Invariant(err.to_string()),
        }
    }
}

impl From<MapperError> for EngineError {
    fn from(err: MapperError) -> Self {
        Self::Storage(StoreError::from(err))
    }
}

/// Convenience alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Shared flag a caller sets to abort a running export or import.
pub type CancelFlag = std::sync::Arc<std::sync::atomic::AtomicBool>;

/// `Cancelled` once `flag` is set.
pub fn check_cancel(flag: &std::sync::atomic::AtomicBool) -> EngineResult<()> {
    if flag.load(std::sync::atomic::Ordering::Relaxed) {
        return Err(EngineError::Cancelled);
    }
    Ok(())
}
