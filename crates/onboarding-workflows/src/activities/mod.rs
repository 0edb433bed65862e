// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! External operations used by the onboarding processes.
//!
//! Processes never call these directly; they go through
//! [`ActivityGateway`](crate::gateway::ActivityGateway), which applies the
//! retry policy of each call and journals the outcome.

mod faults;
mod stub;

pub use faults::SeededFaults;
pub use stub::StubActivities;

use async_trait::async_trait;
use durable_runtime::ActivityError;

use crate::constants::ERR_TYPE_IDENTITY_VERIFICATION_FAILED;
use crate::models::{DocumentUpload, ReminderRequest, VerificationResult};

/// Implementations of the external calls.
///
/// Injected into the processes at construction time.
#[async_trait]
pub trait Activities: Send + Sync {
    /// Send a reminder or notification email. Returns the reminder id.
    async fn send_reminder(&self, request: &ReminderRequest) -> Result<String, ActivityError>;

    /// Disable payment processing for a merchant. Idempotent.
    async fn disable_payments(&self, merchant_id: &str) -> Result<(), ActivityError>;

    /// Check an identity document with the third-party supplier.
    async fn validate_with_supplier(
        &self,
        document: &DocumentUpload,
    ) -> Result<VerificationResult, ActivityError>;

    async fn perform_internal_verifications(
        &self,
        merchant_id: &str,
    ) -> Result<VerificationResult, ActivityError>;
}

/// Syntax check the supplier applies to document ids.
///
/// Every character must be an ASCII decimal digit; anything else is a
/// non-retryable `IdentityVerificationFailed` error.
pub fn validate_document_id(document_id: &str) -> Result<(), ActivityError> {
    if document_id.chars().all(|c| c.is_ascii_digit()) {
        return Ok(());
    }
    Err(ActivityError::non_retryable(
        ERR_TYPE_IDENTITY_VERIFICATION_FAILED,
        "identity document rejected by supplier: contains non-numeric characters",
    ))
}
