// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Phase 1: reminders while waiting for the document (days 0 to 60).

use durable_runtime::Result;
use tracing::info;

use super::OnboardingRun;
use crate::constants::{REMINDER_DAY_30, REMINDER_DAY_60};
use crate::models::{OnboardingStatus, ReminderType};

pub(crate) const REMINDER_SCHEDULE: [(u32, ReminderType); 2] = [
    (REMINDER_DAY_30, ReminderType::Day30),
    (REMINDER_DAY_60, ReminderType::Day60),
];

/// Race each reminder checkpoint against the document signal.
///
/// A document arriving first ends the phase without further reminders. A
/// document delivered at the same instant as a checkpoint wins, and no
/// reminder is sent for that checkpoint.
pub(crate) async fn wait_for_document_with_reminders(run: &OnboardingRun<'_>) -> Result<()> {
    run.state.advance(OnboardingStatus::AwaitingKycDocuments);

    for (day, reminder_type) in REMINDER_SCHEDULE {
        let checkpoint = run.timeline.at_day(run.start_time, day);

        if let Some(document_id) = run.receive_document_until(checkpoint).await? {
            info!(
                merchant_id = %run.merchant_id(),
                document_id = %document_id,
                day,
                "Document received during reminder phase"
            );
            run.state.record_document(document_id);
            return Ok(());
        }

        run.notify(reminder_type).await?;
    }

    Ok(())
}
