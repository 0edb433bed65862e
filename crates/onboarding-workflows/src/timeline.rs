// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Onboarding timeline.
//!
//! All checkpoints are absolute offsets from the process start time:
//!
//! ```text
//! Day 0  → process starts (first payment received)
//! Day 30 → reminder
//! Day 60 → reminder
//! Day 90 → deadline: payments are disabled without a document
//! ```
//!
//! The length of a day is configurable so that demos can run a whole
//! timeline in minutes.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::constants::DEADLINE_DAY_90;

const STANDARD_DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    day: Duration,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Timeline {
    /// Calendar timeline with 24 hour days.
    pub const fn standard() -> Self {
        Self { day: STANDARD_DAY }
    }

    /// Timeline with a custom day length. `None` for a zero length.
    pub fn with_day_length(day: Duration) -> Option<Self> {
        if day.is_zero() {
            return None;
        }
        Some(Self { day })
    }

    pub fn day_length(&self) -> Duration {
        self.day
    }

    /// Span of `n` timeline days.
    pub fn days(&self, n: u32) -> chrono::Duration {
        self.day
            .checked_mul(n)
            .and_then(|span| chrono::Duration::from_std(span).ok())
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Instant `day` timeline days after `start`.
    pub fn at_day(&self, start: DateTime<Utc>, day: u32) -> DateTime<Utc> {
        start
            .checked_add_signed(self.days(day))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The day-90 deadline of a process started at `start`.
    pub fn deadline(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        self.at_day(start, DEADLINE_DAY_90)
    }

    /// Whole timeline days in `span`, rounded towards negative infinity.
    pub fn whole_days(&self, span: chrono::Duration) -> i64 {
        let day_ms = i64::try_from(self.day.as_millis()).unwrap_or(i64::MAX).max(1);
        span.num_milliseconds().div_euclid(day_ms)
    }
}
