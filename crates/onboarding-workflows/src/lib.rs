// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Merchant compliance onboarding on the durable runtime.
//!
//! A merchant that received its first payment has 90 days to submit an
//! identity document. The [`OnboardingProcess`] reminds the merchant on day
//! 30 and day 60, disables payments if the deadline passes without a
//! document, and otherwise verifies the document in the
//! [`IdentityVerificationProcess`] child before approving or rejecting.
//!
//! | Name | Kind | Purpose |
//! |------|------|---------|
//! | `onboarding` | process | Top-level state machine, one per merchant |
//! | `identity-verification` | process | KYC: supplier then internal checks |
//! | `document-submitted` | signal | Payload is the document id |
//! | `onboarding-status` | query | `{status, daysRemaining}` |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use durable_runtime::{MemoryPersistence, Runtime};
//! use onboarding_workflows::{OnboardingProcess, StubActivities, onboarding_instance_id};
//!
//! let runtime = Runtime::builder()
//!     .persistence(Arc::new(MemoryPersistence::new()))
//!     .build()?;
//! let process = Arc::new(OnboardingProcess::new(Arc::new(StubActivities::new())));
//!
//! let id = onboarding_instance_id("MERCH-001");
//! let handle = runtime.start(&id, process, request).await?;
//! runtime.signal(&id, SIGNAL_DOCUMENT_SUBMITTED, "123456789").await?;
//! assert_eq!(handle.result().await?, "ONBOARD-MERCH-001-APPROVED");
//! ```

pub mod activities;
pub mod constants;
pub mod gateway;
pub mod identity;
pub mod models;
pub mod onboarding;
pub mod status;
pub mod timeline;

pub use activities::{Activities, SeededFaults, StubActivities, validate_document_id};
pub use constants::{
    QUERY_ONBOARDING_STATUS, SIGNAL_DOCUMENT_SUBMITTED, kyc_child_id, onboarding_instance_id,
};
pub use gateway::ActivityGateway;
pub use identity::{IdentityVerificationInput, IdentityVerificationProcess};
pub use models::{
    DocumentUpload, MerchantInfo, OnboardingOutcome, OnboardingRequest, OnboardingStatus,
    OnboardingStatusResponse, ProcessState, ReminderRequest, ReminderType, VerificationResult,
};
pub use onboarding::OnboardingProcess;
pub use status::project;
pub use timeline::Timeline;
