// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for the onboarding integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use durable_runtime::{ActivityError, MemoryPersistence, Persistence, Runtime, VirtualClock};
use onboarding_workflows::{
    Activities, DocumentUpload, MerchantInfo, OnboardingRequest, ReminderRequest, ReminderType,
    StubActivities, VerificationResult,
};

pub const DAY: Duration = Duration::from_secs(86_400);

pub fn origin() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-02T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn merchant(merchant_id: &str) -> MerchantInfo {
    MerchantInfo {
        merchant_id: merchant_id.to_string(),
        name: "Acme Online Store".to_string(),
        email: "onboarding@acme-store.com".to_string(),
        country: "NL".to_string(),
        business_type: "ecommerce".to_string(),
    }
}

pub fn request(merchant_id: &str) -> OnboardingRequest {
    OnboardingRequest::new(merchant(merchant_id), origin())
}

pub fn runtime_over(persistence: Arc<dyn Persistence>, clock: Arc<VirtualClock>) -> Runtime {
    Runtime::builder()
        .persistence(persistence)
        .clock(clock)
        .build()
        .unwrap()
}

/// Runtime over fresh memory persistence and a virtual clock at [`origin`].
///
/// Must be called inside a paused-time test.
pub fn test_runtime() -> (Runtime, Arc<VirtualClock>) {
    let clock = Arc::new(VirtualClock::new(origin()));
    let runtime = runtime_over(Arc::new(MemoryPersistence::new()), clock.clone());
    (runtime, clock)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reminder(ReminderType),
    DisablePayments,
    Supplier(String),
    Internal,
}

/// Failure modes layered over [`StubActivities`].
#[derive(Debug, Default, Clone)]
pub struct Behaviour {
    pub reminders_fail: bool,
    pub disable_fails: bool,
    /// Transient supplier failures before the first success.
    pub supplier_outages: u32,
    /// Supplier answers without error but does not verify the document.
    pub supplier_declines: bool,
    pub internal_fails: bool,
}

/// Activities that record every invocation, including retried attempts.
pub struct RecordingActivities {
    stub: StubActivities,
    behaviour: Behaviour,
    supplier_outages_left: AtomicU32,
    calls: Mutex<Vec<Call>>,
}

impl RecordingActivities {
    pub fn new() -> Arc<Self> {
        Self::with(Behaviour::default())
    }

    pub fn with(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            stub: StubActivities::new(),
            supplier_outages_left: AtomicU32::new(behaviour.supplier_outages),
            behaviour,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reminders(&self) -> Vec<ReminderType> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Reminder(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn supplier_documents(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Supplier(doc) => Some(doc),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Activities for RecordingActivities {
    async fn send_reminder(&self, request: &ReminderRequest) -> Result<String, ActivityError> {
        self.record(Call::Reminder(request.reminder_type));
        if self.behaviour.reminders_fail {
            return Err(ActivityError::retryable("smtp relay unavailable"));
        }
        self.stub.send_reminder(request).await
    }

    async fn disable_payments(&self, merchant_id: &str) -> Result<(), ActivityError> {
        self.record(Call::DisablePayments);
        if self.behaviour.disable_fails {
            return Err(ActivityError::retryable("payments api unavailable"));
        }
        self.stub.disable_payments(merchant_id).await
    }

    async fn validate_with_supplier(
        &self,
        document: &DocumentUpload,
    ) -> Result<VerificationResult, ActivityError> {
        self.record(Call::Supplier(document.document_id.clone()));
        let outage = self
            .supplier_outages_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if outage {
            return Err(ActivityError::retryable("supplier unavailable"));
        }
        if self.behaviour.supplier_declines {
            return Ok(VerificationResult::failed(
                format!("SUP-FAIL-{}", document.merchant_id),
                "document expired",
            ));
        }
        self.stub.validate_with_supplier(document).await
    }

    async fn perform_internal_verifications(
        &self,
        merchant_id: &str,
    ) -> Result<VerificationResult, ActivityError> {
        self.record(Call::Internal);
        if self.behaviour.internal_fails {
            return Err(ActivityError::retryable("watchlist service unavailable"));
        }
        self.stub.perform_internal_verifications(merchant_id).await
    }
}
