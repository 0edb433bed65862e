// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtime error types.

use thiserror::Error;

/// Errors raised by the durable runtime.
///
/// These are substrate faults. Business failures of activities are not
/// represented here; they surface as [`crate::ActivityFailure`] values.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid runtime configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Start rejected because the instance id is live or persisted as running
    #[error("instance '{instance_id}' is already running")]
    InstanceAlreadyRunning {
        /// Instance identifier used as the idempotency key
        instance_id: String,
    },

    /// No record exists for the instance
    #[error("instance '{instance_id}' not found")]
    InstanceNotFound {
        /// Instance identifier
        instance_id: String,
    },

    /// The instance exists but is not running in this runtime
    #[error("instance '{instance_id}' is not running")]
    InstanceNotRunning {
        /// Instance identifier
        instance_id: String,
    },

    /// Persisted instance belongs to a different process type
    #[error("instance '{instance_id}' was started as '{actual}', not '{expected}'")]
    ProcessTypeMismatch {
        /// Instance identifier
        instance_id: String,
        /// Process type requested by the caller
        expected: String,
        /// Process type stored with the instance
        actual: String,
    },

    /// A child with the same id is already executing
    #[error("child process '{child_id}' is already running")]
    ChildAlreadyRunning {
        /// Deterministic child identifier
        child_id: String,
    },

    /// Query handler name registered twice by the same instance
    #[error("query handler '{name}' is already registered")]
    QueryHandlerExists {
        /// Query name
        name: String,
    },

    /// No handler registered under the requested query name
    #[error("query '{name}' is not registered on instance '{instance_id}'")]
    QueryNotFound {
        /// Instance identifier
        instance_id: String,
        /// Query name
        name: String,
    },

    /// Replay diverged from the recorded journal
    #[error(
        "non-deterministic replay of '{instance_id}' at {checkpoint_id}: recorded '{recorded}', got '{requested}'"
    )]
    NonDeterministic {
        /// Instance identifier
        instance_id: String,
        /// Journal position
        checkpoint_id: String,
        /// Label stored in the journal
        recorded: String,
        /// Label requested by the process body
        requested: String,
    },

    /// The process body returned a fault
    #[error("process failed: {0}")]
    ProcessFailed(String),

    /// The process task was aborted before completing
    #[error("instance '{instance_id}' was cancelled")]
    Cancelled {
        /// Instance identifier
        instance_id: String,
    },

    /// Persistence backend failure
    #[error("persistence error during '{operation}': {details}")]
    Persistence {
        /// Operation that failed
        operation: String,
        /// Backend error message
        details: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal runtime error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for RuntimeError {
    fn from(err: sqlx::Error) -> Self {
        RuntimeError::Persistence {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Serialization(err.to_string())
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
