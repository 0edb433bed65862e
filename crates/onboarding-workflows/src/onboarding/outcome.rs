// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Phase 3: disable payments or run KYC.

use durable_runtime::Result;
use tracing::{error, info};

use super::OnboardingRun;
use crate::constants::kyc_child_id;
use crate::identity::{IdentityVerificationInput, IdentityVerificationProcess};
use crate::models::{OnboardingOutcome, OnboardingStatus, ReminderType};

/// Deadline missed. A failed disable call is logged; the outcome stands.
pub(crate) async fn disable_payments(run: &OnboardingRun<'_>) -> Result<OnboardingOutcome> {
    info!(
        merchant_id = %run.merchant_id(),
        "Onboarding deadline expired, disabling payments"
    );
    run.state.advance(OnboardingStatus::PaymentsDisabled);

    if let Err(failure) = run.gateway.disable_payments(run.merchant_id()).await? {
        error!(
            merchant_id = %run.merchant_id(),
            error = %failure,
            "Failed to disable payments"
        );
    }

    Ok(OnboardingOutcome::PaymentsDisabled)
}

/// Verify the submitted document in the KYC child process.
pub(crate) async fn run_kyc(
    run: &OnboardingRun<'_>,
    identity: &IdentityVerificationProcess,
    document_id: String,
) -> Result<OnboardingOutcome> {
    info!(merchant_id = %run.merchant_id(), "Starting KYC verification");
    run.state.advance(OnboardingStatus::KycInProgress);

    let input = IdentityVerificationInput {
        merchant_id: run.merchant_id().to_string(),
        document_id,
    };
    let result = run
        .ctx
        .execute_child(&kyc_child_id(run.merchant_id()), identity, input)
        .await?;

    if !result.passed {
        run.state.advance(OnboardingStatus::Rejected);
        info!(
            merchant_id = %run.merchant_id(),
            details = %result.details,
            "KYC verification failed"
        );
        run.notify(ReminderType::KycRejection).await?;
        return Ok(OnboardingOutcome::KycRejected);
    }

    run.state.advance(OnboardingStatus::Approved);
    info!(
        merchant_id = %run.merchant_id(),
        verification_id = %result.verification_id,
        "Onboarding approved"
    );
    run.notify(ReminderType::OnboardingApproved).await?;
    Ok(OnboardingOutcome::Approved)
}
