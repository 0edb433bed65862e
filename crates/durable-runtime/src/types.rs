// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Core types shared by the runtime, persistence and process bodies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity::ActivityError;

/// Lifecycle status of a persisted instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Started and not yet finished (possibly orphaned by a crash)
    Running,
    /// Finished with an output
    Completed,
    /// Finished with a process fault
    Failed,
}

impl InstanceStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Failed => "failed",
        }
    }

    /// Whether the instance has finished.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Running)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(InstanceStatus::Running),
            "completed" => Ok(InstanceStatus::Completed),
            "failed" => Ok(InstanceStatus::Failed),
            other => Err(format!("unknown instance status '{}'", other)),
        }
    }
}

/// Retry behavior for a single activity invocation.
///
/// Delays grow as `initial_interval * backoff_coefficient^(attempt-1)` and are
/// capped at `maximum_interval`. Attempts are 1-indexed: attempt 1 is the first
/// call, so `delay_for_attempt(1)` is the wait between the first failure and the
/// second call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Multiplier applied per retry.
    pub backoff_coefficient: f64,
    /// Upper bound for a single delay.
    pub maximum_interval: Duration,
    /// Total attempts including the first call. `None` retries until success
    /// or a non-retryable error.
    pub maximum_attempts: Option<u32>,
    /// Error types that bypass retries.
    pub non_retryable_error_types: Vec<String>,
}

impl RetryPolicy {
    /// Policy with the given attempt limit and default backoff.
    pub fn with_maximum_attempts(maximum_attempts: u32) -> Self {
        Self {
            maximum_attempts: Some(maximum_attempts),
            ..Self::default()
        }
    }

    /// Policy that retries until success or a non-retryable error.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Override the backoff shape.
    pub fn backoff(
        mut self,
        initial_interval: Duration,
        backoff_coefficient: f64,
        maximum_interval: Duration,
    ) -> Self {
        self.initial_interval = initial_interval;
        self.backoff_coefficient = backoff_coefficient;
        self.maximum_interval = maximum_interval;
        self
    }

    /// Classify an error type as non-retryable.
    pub fn non_retryable(mut self, error_type: impl Into<String>) -> Self {
        self.non_retryable_error_types.push(error_type.into());
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay.min(self.maximum_interval),
            Err(_) => self.maximum_interval,
        }
    }

    /// Whether `attempts_made` attempts use up the budget.
    pub fn attempts_exhausted(&self, attempts_made: u32) -> bool {
        self.maximum_attempts
            .is_some_and(|max| attempts_made >= max)
    }

    /// Whether the error may be retried under this policy.
    pub fn is_retryable(&self, error: &ActivityError) -> bool {
        if error.is_non_retryable() {
            return false;
        }
        !self
            .non_retryable_error_types
            .iter()
            .any(|t| t == error.error_type())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let initial_interval = Duration::from_secs(1);
        Self {
            initial_interval,
            backoff_coefficient: 2.0,
            maximum_interval: initial_interval * 100,
            maximum_attempts: None,
            non_retryable_error_types: Vec::new(),
        }
    }
}

/// Per-call activity options.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// Timeout applied to each attempt.
    pub start_to_close_timeout: Duration,
    /// Retry behavior across attempts.
    pub retry_policy: RetryPolicy,
}

impl ActivityOptions {
    pub fn new(start_to_close_timeout: Duration, retry_policy: RetryPolicy) -> Self {
        Self {
            start_to_close_timeout,
            retry_policy,
        }
    }
}
