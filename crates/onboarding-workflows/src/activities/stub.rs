// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stand-in activities: no email, payment or KYC provider is contacted.

use async_trait::async_trait;
use durable_runtime::ActivityError;
use tracing::{error, info};

use super::{Activities, SeededFaults, validate_document_id};
use crate::models::{DocumentUpload, ReminderRequest, VerificationResult};

/// Activities that log what they would do and succeed.
///
/// With [`SeededFaults`] attached, supplier calls fail transiently at the
/// configured rate to exercise the retry policy.
#[derive(Debug, Default)]
pub struct StubActivities {
    supplier_faults: Option<SeededFaults>,
}

impl StubActivities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supplier_faults(mut self, faults: SeededFaults) -> Self {
        self.supplier_faults = Some(faults);
        self
    }
}

#[async_trait]
impl Activities for StubActivities {
    async fn send_reminder(&self, request: &ReminderRequest) -> Result<String, ActivityError> {
        info!(
            merchant_id = %request.merchant_id,
            reminder_type = %request.reminder_type,
            email = %request.email,
            "Sending reminder"
        );
        let reminder_id = format!("REMIND-{}-{}", request.merchant_id, request.reminder_type);
        info!(reminder_id = %reminder_id, "Reminder sent");
        Ok(reminder_id)
    }

    async fn disable_payments(&self, merchant_id: &str) -> Result<(), ActivityError> {
        info!(merchant_id = %merchant_id, "Payments disabled");
        Ok(())
    }

    async fn validate_with_supplier(
        &self,
        document: &DocumentUpload,
    ) -> Result<VerificationResult, ActivityError> {
        info!(
            merchant_id = %document.merchant_id,
            document_type = %document.document_type,
            document_id = %document.document_id,
            "Sending document to verification supplier"
        );

        if let Err(e) = validate_document_id(&document.document_id) {
            info!(
                merchant_id = %document.merchant_id,
                document_id = %document.document_id,
                "Supplier rejected identity document"
            );
            return Err(e);
        }

        if let Some(faults) = &self.supplier_faults {
            if faults.roll() {
                error!(
                    merchant_id = %document.merchant_id,
                    rate = faults.rate(),
                    "Simulated supplier outage"
                );
                return Err(ActivityError::retryable(
                    "simulated 3rd party API failure (transient)",
                ));
            }
        }

        Ok(VerificationResult::passed(
            format!("SUP-{}", document.merchant_id),
            "Identity document verified by supplier",
        ))
    }

    async fn perform_internal_verifications(
        &self,
        merchant_id: &str,
    ) -> Result<VerificationResult, ActivityError> {
        info!(merchant_id = %merchant_id, "Internal identity verification passed");
        Ok(VerificationResult::passed(
            format!("INT-{}", merchant_id),
            "Internal identity verification passed",
        ))
    }
}
