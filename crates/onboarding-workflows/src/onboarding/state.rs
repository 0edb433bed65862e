// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Owned onboarding state.
//!
//! The process body is the only writer. Every change is published through a
//! watch channel so the status query always reads the latest committed
//! snapshot without blocking the body.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::warn;

use crate::models::{OnboardingStatus, ProcessState};

pub struct StateHandle {
    tx: watch::Sender<ProcessState>,
}

impl StateHandle {
    pub fn new(initial: ProcessState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Read side for query handlers.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProcessState {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> OnboardingStatus {
        self.tx.borrow().status
    }

    pub fn document_id(&self) -> Option<String> {
        self.tx.borrow().document_id.clone()
    }

    pub fn has_document(&self) -> bool {
        self.tx.borrow().document_id.is_some()
    }

    /// Set the recorded start time; later calls are ignored.
    pub fn record_start(&self, start_time: DateTime<Utc>) -> bool {
        self.tx.send_if_modified(|state| {
            if state.start_time.is_some() {
                return false;
            }
            state.start_time = Some(start_time);
            true
        })
    }

    /// Move to `next` if it is a forward edge of the state graph.
    pub fn advance(&self, next: OnboardingStatus) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.status.can_transition_to(next) {
                warn!(from = %state.status, to = %next, "Ignoring invalid status transition");
                return false;
            }
            state.status = next;
            true
        })
    }

    /// Store the document id unless one is already set.
    pub fn record_document(&self, document_id: String) -> bool {
        self.tx.send_if_modified(|state| {
            if state.document_id.is_some() {
                return false;
            }
            state.document_id = Some(document_id);
            true
        })
    }
}
