//! Error types for KyroDrift.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! exact failure class. The split follows how each class is handled:
//!
//! - [`ValidationError`] rejects one candidate and never changes on retry.
//! - [`ConfigError`] is fatal and only ever raised at startup.
//! - [`ResolutionError`] classifies a failed candidate for its ERROR action.
//! - [`DriftError`] is the umbrella type returned by the public API.

use thiserror::Error;

use crate::behavior::{BehaviorId, BehaviorState};
use crate::storage::StorageError;

/// Validation errors that occur while checking a single candidate or request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Credibility value {value} is out of range [0.0, 1.0]")]
    CredibilityOutOfRange {
        value: f64,
    },

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    InvalidEmbeddingDimension {
        actual: usize,
        expected: usize,
    },

    #[error("Embedding component at index {index} is not finite")]
    NonFiniteEmbedding {
        index: usize,
    },

    #[error("Required field '{field}' is missing or empty")]
    MissingField {
        field: String,
    },

    #[error("Page limit {limit} is outside [1, {max}]")]
    InvalidPageLimit {
        limit: usize,
        max: usize,
    },
}

/// Configuration errors. These prevent the engine from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("Environment variable {var}='{value}' could not be parsed")]
    InvalidEnv {
        var: &'static str,
        value: String,
    },

    #[error("Configured embedding dimension {configured} does not match store dimension {stored}")]
    DimensionMismatch {
        configured: usize,
        stored: usize,
    },

    #[error("Failed to read config file {path}: {message}")]
    Io {
        path: String,
        message: String,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a single candidate could not be resolved.
///
/// Every variant ends up as an ERROR action for that candidate; the batch
/// carries on with the next one.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Invalid candidate: {0}")]
    Validation(#[from] ValidationError),

    #[error("Behavior {behavior_id} changed concurrently (now {current}) after {attempts} attempts")]
    ConcurrencyConflict {
        behavior_id: BehaviorId,
        current: BehaviorState,
        attempts: u32,
    },

    #[error("Store unavailable after {attempts} attempts: {source}")]
    TransientStore {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("Store error: {0}")]
    Storage(StorageError),
}

impl ResolutionError {
    /// Short stable label used in audit records and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::TransientStore { .. } => "transient_store",
            Self::Storage(_) => "storage",
        }
    }
}

/// Errors from the bounded worker runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Lane {lane} queue is full (capacity {capacity})")]
    QueueFull {
        lane: usize,
        capacity: usize,
    },

    #[error("Lane {lane} is disconnected")]
    Disconnected {
        lane: usize,
    },

    #[error("Batch did not complete within {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Failed to spawn worker: {message}")]
    Spawn {
        message: String,
    },
}

/// Top-level error type for KyroDrift.
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl DriftError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Config(_) => false,
            Self::Storage(e) => e.is_transient(),
            Self::Resolution(e) => matches!(
                e,
                ResolutionError::ConcurrencyConflict { .. } | ResolutionError::TransientStore { .. }
            ),
            Self::Runtime(e) => {
                matches!(e, RuntimeError::QueueFull { .. } | RuntimeError::Timeout { .. })
            }
        }
    }
}

/// Result type alias for KyroDrift operations.
pub type DriftResult<T> = Result<T, DriftError>;
