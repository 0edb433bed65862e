// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Status projection served by the `onboarding-status` query.

use chrono::{DateTime, Utc};

use crate::constants::DEADLINE_DAY_90;
use crate::models::{OnboardingStatusResponse, ProcessState};
use crate::timeline::Timeline;

/// Snapshot of `state` as seen at `now`.
///
/// `days_remaining` counts whole timeline days until the day-90 deadline and
/// stays at zero once the deadline has passed. Before the start time is
/// recorded the whole window remains.
pub fn project(
    state: &ProcessState,
    now: DateTime<Utc>,
    timeline: &Timeline,
) -> OnboardingStatusResponse {
    let days_remaining = match state.start_time {
        Some(start_time) => {
            let days = timeline.whole_days(timeline.deadline(start_time) - now).max(0);
            u32::try_from(days).unwrap_or(u32::MAX)
        }
        None => DEADLINE_DAY_90,
    };

    OnboardingStatusResponse {
        status: state.status,
        days_remaining,
    }
}
