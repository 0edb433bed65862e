// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Activity error classification.
//!
//! Activities report failures as [`ActivityError`]. The runtime applies the
//! caller's [`RetryPolicy`](crate::RetryPolicy) and, once it gives up, hands
//! the process body an [`ActivityFailure`]. Both are serializable because the
//! final outcome of every activity is written to the journal.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type assigned to activity errors created without a classification.
pub const GENERIC_ERROR_TYPE: &str = "ActivityError";

/// Error type reported for start-to-close timeouts.
pub const TIMEOUT_ERROR_TYPE: &str = "StartToCloseTimeout";

/// Failure of a single activity attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActivityError {
    /// Error raised by the activity implementation
    #[error("{message}")]
    Application {
        /// Classification matched against `non_retryable_error_types`
        error_type: String,
        /// Human readable cause
        message: String,
        /// Set by the activity to bypass retries regardless of policy
        non_retryable: bool,
    },

    /// Attempt exceeded its start-to-close timeout
    #[error("attempt timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout
        timeout_ms: u64,
    },
}

impl ActivityError {
    /// Unclassified, retryable error.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::application(GENERIC_ERROR_TYPE, message)
    }

    /// Classified error; retryability is decided by the caller's policy.
    pub fn application(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityError::Application {
            error_type: error_type.into(),
            message: message.into(),
            non_retryable: false,
        }
    }

    /// Classified error that is never retried.
    pub fn non_retryable(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityError::Application {
            error_type: error_type.into(),
            message: message.into(),
            non_retryable: true,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        ActivityError::Timeout {
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn error_type(&self) -> &str {
        match self {
            ActivityError::Application { error_type, .. } => error_type,
            ActivityError::Timeout { .. } => TIMEOUT_ERROR_TYPE,
        }
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(
            self,
            ActivityError::Application {
                non_retryable: true,
                ..
            }
        )
    }
}

/// Terminal failure of an activity after the retry policy gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActivityFailure {
    /// Stopped at the first non-retryable error
    #[error("{activity} failed with non-retryable {} after {attempts} attempt(s): {source}", .source.error_type())]
    NonRetryable {
        /// Activity name
        activity: String,
        /// Attempts made
        attempts: u32,
        /// Error of the last attempt
        source: ActivityError,
    },

    /// Attempt budget used up
    #[error("{activity} exhausted {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Activity name
        activity: String,
        /// Attempts made
        attempts: u32,
        /// Error of the last attempt
        source: ActivityError,
    },
}

impl ActivityFailure {
    pub fn attempts(&self) -> u32 {
        match self {
            ActivityFailure::NonRetryable { attempts, .. }
            | ActivityFailure::RetriesExhausted { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> &ActivityError {
        match self {
            ActivityFailure::NonRetryable { source, .. }
            | ActivityFailure::RetriesExhausted { source, .. } => source,
        }
    }
}

/// Outcome of an activity as seen by the process body.
pub type ActivityResult<T> = std::result::Result<T, ActivityFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        assert_eq!(ActivityError::retryable("x").error_type(), GENERIC_ERROR_TYPE);
        assert_eq!(
            ActivityError::timeout(Duration::from_secs(10)).error_type(),
            TIMEOUT_ERROR_TYPE
        );
        let err = ActivityError::non_retryable("IdentityVerificationFailed", "bad id");
        assert_eq!(err.error_type(), "IdentityVerificationFailed");
        assert!(err.is_non_retryable());
        assert_eq!(err.to_string(), "bad id");
    }

    #[test]
    fn test_failure_display() {
        let failure = ActivityFailure::NonRetryable {
            activity: "ValidateWithSupplier".to_string(),
            attempts: 1,
            source: ActivityError::non_retryable("IdentityVerificationFailed", "bad id"),
        };
        assert_eq!(
            failure.to_string(),
            "ValidateWithSupplier failed with non-retryable IdentityVerificationFailed after 1 attempt(s): bad id"
        );
        assert_eq!(failure.attempts(), 1);

        let failure = ActivityFailure::RetriesExhausted {
            activity: "DisablePayments".to_string(),
            attempts: 3,
            source: ActivityError::timeout(Duration::from_secs(10)),
        };
        assert_eq!(
            failure.to_string(),
            "DisablePayments exhausted 3 attempt(s): attempt timed out after 10000ms"
        );
    }

    #[test]
    fn test_failure_survives_journal_encoding() {
        let outcome: ActivityResult<String> = Err(ActivityFailure::RetriesExhausted {
            activity: "SendReminder".to_string(),
            attempts: 3,
            source: ActivityError::retryable("smtp unavailable"),
        });
        let encoded = serde_json::to_value(&outcome).unwrap();
        let decoded: ActivityResult<String> = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, outcome);
    }
}
