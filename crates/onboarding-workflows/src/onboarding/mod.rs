// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Merchant onboarding process.
//!
//! Triggered by a merchant's first payment. The merchant can take payments
//! right away but must submit an identity document within 90 days:
//!
//! 1. Reminders: race the day-30 and day-60 timers against the
//!    `document-submitted` signal, sending a reminder whenever a timer wins.
//! 2. Deadline: without a document, wait for it until day 90.
//! 3. Outcome: disable payments, or verify the document in the KYC child
//!    process and approve or reject.
//!
//! ```text
//! PENDING ─▶ AWAITING_KYC_DOCUMENTS ─┬─▶ PAYMENTS_DISABLED
//!                                    └─▶ KYC_IN_PROGRESS ─┬─▶ APPROVED
//!                                                         └─▶ REJECTED
//! ```

mod deadline;
mod outcome;
mod reminders;
mod state;

pub use state::StateHandle;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use durable_runtime::{Clock, Process, ProcessContext, Result};
use tracing::{error, info, instrument, warn};

use crate::activities::Activities;
use crate::constants::{QUERY_ONBOARDING_STATUS, SIGNAL_DOCUMENT_SUBMITTED};
use crate::gateway::ActivityGateway;
use crate::identity::IdentityVerificationProcess;
use crate::models::{
    MerchantInfo, OnboardingRequest, ProcessState, ReminderRequest, ReminderType,
};
use crate::status::project;
use crate::timeline::Timeline;

pub struct OnboardingProcess {
    activities: Arc<dyn Activities>,
    identity: IdentityVerificationProcess,
    timeline: Timeline,
}

impl OnboardingProcess {
    pub fn new(activities: Arc<dyn Activities>) -> Self {
        Self::with_timeline(activities, Timeline::standard())
    }

    pub fn with_timeline(activities: Arc<dyn Activities>, timeline: Timeline) -> Self {
        Self {
            identity: IdentityVerificationProcess::new(activities.clone()),
            activities,
            timeline,
        }
    }

    pub fn timeline(&self) -> Timeline {
        self.timeline
    }
}

/// Everything a phase works with, passed explicitly from phase to phase.
pub(crate) struct OnboardingRun<'a> {
    pub(crate) ctx: &'a ProcessContext,
    pub(crate) gateway: ActivityGateway<'a>,
    pub(crate) merchant: &'a MerchantInfo,
    pub(crate) timeline: Timeline,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) state: StateHandle,
}

impl OnboardingRun<'_> {
    pub(crate) fn merchant_id(&self) -> &str {
        &self.merchant.merchant_id
    }

    /// Next non-empty document id delivered before `deadline`.
    ///
    /// Empty payloads are skipped and the wait continues against the same
    /// deadline.
    pub(crate) async fn receive_document_until(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Option<String>> {
        loop {
            match self
                .ctx
                .receive_signal_until(SIGNAL_DOCUMENT_SUBMITTED, deadline)
                .await?
            {
                Some(document_id) if document_id.is_empty() => {
                    warn!(
                        merchant_id = %self.merchant_id(),
                        "Ignoring empty document submission"
                    );
                }
                other => return Ok(other),
            }
        }
    }

    /// Send a reminder or notification; failures are logged, never raised.
    pub(crate) async fn notify(&self, reminder_type: ReminderType) -> Result<()> {
        let request = ReminderRequest::for_merchant(self.merchant, reminder_type);
        match self.gateway.send_reminder(&request).await? {
            Ok(reminder_id) => info!(
                merchant_id = %self.merchant_id(),
                reminder_type = %reminder_type,
                reminder_id = %reminder_id,
                "Reminder sent"
            ),
            Err(failure) => error!(
                merchant_id = %self.merchant_id(),
                reminder_type = %reminder_type,
                error = %failure,
                "Failed to send reminder"
            ),
        }
        Ok(())
    }
}

/// Serve the status query from the live state for the instance's lifetime.
fn register_status_query(
    ctx: &ProcessContext,
    state: &StateHandle,
    timeline: Timeline,
) -> Result<()> {
    let snapshot = state.subscribe();
    let clock = ctx.clock();
    ctx.set_query_handler(QUERY_ONBOARDING_STATUS, move || {
        project(&snapshot.borrow(), clock.now(), &timeline)
    })
}

#[async_trait]
impl Process for OnboardingProcess {
    const NAME: &'static str = "onboarding";
    type Input = OnboardingRequest;
    type Output = String;

    #[instrument(
        skip_all,
        fields(instance_id = %ctx.instance_id(), merchant_id = %input.merchant.merchant_id)
    )]
    async fn run(&self, ctx: &ProcessContext, input: OnboardingRequest) -> Result<String> {
        let merchant = &input.merchant;

        let state = StateHandle::new(ProcessState::new());
        register_status_query(ctx, &state, self.timeline)?;

        let start_time = ctx.side_effect("start-time", || ctx.now()).await?;
        state.record_start(start_time);

        info!(
            first_payment_date = %input.first_payment_date,
            deadline = %self.timeline.deadline(start_time),
            "Onboarding started"
        );

        let run = OnboardingRun {
            ctx,
            gateway: ActivityGateway::new(ctx, self.activities.as_ref()),
            merchant,
            timeline: self.timeline,
            start_time,
            state,
        };

        reminders::wait_for_document_with_reminders(&run).await?;
        deadline::wait_for_deadline(&run).await?;

        let outcome = match run.state.document_id() {
            None => outcome::disable_payments(&run).await?,
            Some(document_id) => outcome::run_kyc(&run, &self.identity, document_id).await?,
        };

        info!(outcome = ?outcome, status = %run.state.status(), "Onboarding finished");
        Ok(outcome.outcome_string(&merchant.merchant_id))
    }
}
