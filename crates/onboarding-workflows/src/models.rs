// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Onboarding data model. All JSON field names are camelCase.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DOCUMENT_TYPE_GOVERNMENT_ID;

/// Identity of the merchant being onboarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantInfo {
    pub merchant_id: String,
    pub name: String,
    pub email: String,
    pub country: String,
    pub business_type: String,
}

/// Input of the onboarding process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    pub merchant: MerchantInfo,
    pub first_payment_date: DateTime<Utc>,
}

impl OnboardingRequest {
    pub fn new(merchant: MerchantInfo, first_payment_date: DateTime<Utc>) -> Self {
        Self {
            merchant,
            first_payment_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    Pending,
    AwaitingKycDocuments,
    KycInProgress,
    Approved,
    Rejected,
    PaymentsDisabled,
}

impl OnboardingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStatus::Pending => "PENDING",
            OnboardingStatus::AwaitingKycDocuments => "AWAITING_KYC_DOCUMENTS",
            OnboardingStatus::KycInProgress => "KYC_IN_PROGRESS",
            OnboardingStatus::Approved => "APPROVED",
            OnboardingStatus::Rejected => "REJECTED",
            OnboardingStatus::PaymentsDisabled => "PAYMENTS_DISABLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OnboardingStatus::Approved
                | OnboardingStatus::Rejected
                | OnboardingStatus::PaymentsDisabled
        )
    }

    /// Whether `next` is a forward edge of the onboarding state graph.
    pub fn can_transition_to(&self, next: OnboardingStatus) -> bool {
        use OnboardingStatus::*;
        matches!(
            (self, next),
            (Pending, AwaitingKycDocuments)
                | (AwaitingKycDocuments, PaymentsDisabled)
                | (AwaitingKycDocuments, KycInProgress)
                | (KycInProgress, Approved)
                | (KycInProgress, Rejected)
        )
    }
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by one onboarding process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    pub status: OnboardingStatus,
    /// Set once, when the first non-empty document id arrives.
    pub document_id: Option<String>,
    /// Unset until the start time has been recorded.
    pub start_time: Option<DateTime<Utc>>,
}

impl ProcessState {
    pub fn new() -> Self {
        Self {
            status: OnboardingStatus::Pending,
            document_id: None,
            start_time: None,
        }
    }

    pub fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start_time),
            ..Self::new()
        }
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReminderType {
    Day30,
    Day60,
    KycRejection,
    OnboardingApproved,
}

impl ReminderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::Day30 => "day30",
            ReminderType::Day60 => "day60",
            ReminderType::KycRejection => "kycRejection",
            ReminderType::OnboardingApproved => "onboardingApproved",
        }
    }
}

impl fmt::Display for ReminderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub merchant_id: String,
    pub email: String,
    pub reminder_type: ReminderType,
}

impl ReminderRequest {
    pub fn for_merchant(merchant: &MerchantInfo, reminder_type: ReminderType) -> Self {
        Self {
            merchant_id: merchant.merchant_id.clone(),
            email: merchant.email.clone(),
            reminder_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpload {
    pub merchant_id: String,
    pub document_type: String,
    pub document_id: String,
}

impl DocumentUpload {
    pub fn government_id(merchant_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            document_type: DOCUMENT_TYPE_GOVERNMENT_ID.to_string(),
            document_id: document_id.into(),
        }
    }
}

/// Outcome of a verification step, or of the whole KYC child process.
///
/// A rejection is a value with `passed == false`, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub passed: bool,
    pub verification_id: String,
    pub details: String,
}

impl VerificationResult {
    pub fn passed(verification_id: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            verification_id: verification_id.into(),
            details: details.into(),
        }
    }

    pub fn failed(verification_id: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            verification_id: verification_id.into(),
            details: details.into(),
        }
    }
}

/// Answer to the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatusResponse {
    pub status: OnboardingStatus,
    pub days_remaining: u32,
}

/// Terminal business outcome of an onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingOutcome {
    Approved,
    KycRejected,
    PaymentsDisabled,
}

impl OnboardingOutcome {
    fn suffix(&self) -> &'static str {
        match self {
            OnboardingOutcome::Approved => "APPROVED",
            OnboardingOutcome::KycRejected => "KYC-REJECTED",
            OnboardingOutcome::PaymentsDisabled => "PAYMENTS-DISABLED",
        }
    }

    /// Outcome string returned to the starter, e.g. `ONBOARD-MERCH-001-APPROVED`.
    pub fn outcome_string(&self, merchant_id: &str) -> String {
        format!("ONBOARD-{}-{}", merchant_id, self.suffix())
    }

    pub fn status(&self) -> OnboardingStatus {
        match self {
            OnboardingOutcome::Approved => OnboardingStatus::Approved,
            OnboardingOutcome::KycRejected => OnboardingStatus::Rejected,
            OnboardingOutcome::PaymentsDisabled => OnboardingStatus::PaymentsDisabled,
        }
    }
}
