// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed access to the activities, one method per external call.
//!
//! | Call | Idempotent | Timeout | Retry policy |
//! |------|------------|---------|--------------|
//! | SendReminder | no | 10s | 3 attempts |
//! | DisablePayments | yes | 10s | 3 attempts |
//! | ValidateWithSupplier | yes | 30s | backoff 1s x2 capped at 30s, unlimited, `IdentityVerificationFailed` not retried |
//! | PerformInternalVerifications | yes | 10s | 2 attempts |
//!
//! The outer `Result` carries runtime faults (journal, persistence); the
//! inner [`ActivityResult`] is the business outcome of the call.

use std::time::Duration;

use durable_runtime::{ActivityOptions, ActivityResult, ProcessContext, Result, RetryPolicy};

use crate::activities::Activities;
use crate::constants::ERR_TYPE_IDENTITY_VERIFICATION_FAILED;
use crate::models::{DocumentUpload, ReminderRequest, VerificationResult};

pub const SEND_REMINDER: &str = "SendReminder";
pub const DISABLE_PAYMENTS: &str = "DisablePayments";
pub const VALIDATE_WITH_SUPPLIER: &str = "ValidateWithSupplier";
pub const PERFORM_INTERNAL_VERIFICATIONS: &str = "PerformInternalVerifications";

pub fn reminder_options() -> ActivityOptions {
    ActivityOptions::new(
        Duration::from_secs(10),
        RetryPolicy::with_maximum_attempts(3),
    )
}

pub fn disable_payments_options() -> ActivityOptions {
    ActivityOptions::new(
        Duration::from_secs(10),
        RetryPolicy::with_maximum_attempts(3),
    )
}

pub fn supplier_options() -> ActivityOptions {
    ActivityOptions::new(
        Duration::from_secs(30),
        RetryPolicy::unlimited()
            .backoff(Duration::from_secs(1), 2.0, Duration::from_secs(30))
            .non_retryable(ERR_TYPE_IDENTITY_VERIFICATION_FAILED),
    )
}

pub fn internal_verification_options() -> ActivityOptions {
    ActivityOptions::new(
        Duration::from_secs(10),
        RetryPolicy::with_maximum_attempts(2),
    )
}

/// Activities bound to one process context.
pub struct ActivityGateway<'a> {
    ctx: &'a ProcessContext,
    activities: &'a dyn Activities,
}

impl<'a> ActivityGateway<'a> {
    pub fn new(ctx: &'a ProcessContext, activities: &'a dyn Activities) -> Self {
        Self { ctx, activities }
    }

    pub async fn send_reminder(&self, request: &ReminderRequest) -> Result<ActivityResult<String>> {
        let activities = self.activities;
        self.ctx
            .execute_activity(SEND_REMINDER, &reminder_options(), move || {
                activities.send_reminder(request)
            })
            .await
    }

    pub async fn disable_payments(&self, merchant_id: &str) -> Result<ActivityResult<()>> {
        let activities = self.activities;
        self.ctx
            .execute_activity(DISABLE_PAYMENTS, &disable_payments_options(), move || {
                activities.disable_payments(merchant_id)
            })
            .await
    }

    pub async fn validate_with_supplier(
        &self,
        document: &DocumentUpload,
    ) -> Result<ActivityResult<VerificationResult>> {
        let activities = self.activities;
        self.ctx
            .execute_activity(VALIDATE_WITH_SUPPLIER, &supplier_options(), move || {
                activities.validate_with_supplier(document)
            })
            .await
    }

    pub async fn perform_internal_verifications(
        &self,
        merchant_id: &str,
    ) -> Result<ActivityResult<VerificationResult>> {
        let activities = self.activities;
        self.ctx
            .execute_activity(
                PERFORM_INTERNAL_VERIFICATIONS,
                &internal_verification_options(),
                move || activities.perform_internal_verifications(merchant_id),
            )
            .await
    }
}
