// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Names and timeline constants shared by starters, workers and processes.

/// Signal carrying the merchant's identity document id.
pub const SIGNAL_DOCUMENT_SUBMITTED: &str = "document-submitted";

/// Query returning an [`OnboardingStatusResponse`](crate::models::OnboardingStatusResponse).
pub const QUERY_ONBOARDING_STATUS: &str = "onboarding-status";

/// First reminder, in days after start.
pub const REMINDER_DAY_30: u32 = 30;

/// Second reminder, in days after start.
pub const REMINDER_DAY_60: u32 = 60;

/// Hard deadline, in days after start.
pub const DEADLINE_DAY_90: u32 = 90;

/// Error type raised by the supplier for a malformed document id.
pub const ERR_TYPE_IDENTITY_VERIFICATION_FAILED: &str = "IdentityVerificationFailed";

/// The only document type the onboarding flow collects.
pub const DOCUMENT_TYPE_GOVERNMENT_ID: &str = "governmentId";

/// Instance id of the onboarding process for a merchant.
///
/// One onboarding per merchant may be in flight; the runtime rejects a
/// second start under the same id.
pub fn onboarding_instance_id(merchant_id: &str) -> String {
    format!("onboard-merchant-{}", merchant_id)
}

/// Instance id of the KYC child process for a merchant.
pub fn kyc_child_id(merchant_id: &str) -> String {
    format!("kyc-verify-{}", merchant_id)
}
