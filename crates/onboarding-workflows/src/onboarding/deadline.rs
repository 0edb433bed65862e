// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Phase 2: last wait for the document, until day 90.

use durable_runtime::Result;
use tracing::{debug, info};

use super::OnboardingRun;
use crate::constants::SIGNAL_DOCUMENT_SUBMITTED;

pub(crate) async fn wait_for_deadline(run: &OnboardingRun<'_>) -> Result<()> {
    if run.state.has_document() {
        return Ok(());
    }

    let deadline = run.timeline.deadline(run.start_time);
    info!(
        merchant_id = %run.merchant_id(),
        deadline = %deadline,
        "Waiting for document until deadline"
    );

    if let Some(document_id) = run.receive_document_until(deadline).await? {
        info!(
            merchant_id = %run.merchant_id(),
            document_id = %document_id,
            "Document received before deadline"
        );
        run.state.record_document(document_id);
    }

    // Anything still queued at the boundary. The first document id is kept.
    while let Some(document_id) = run
        .ctx
        .try_receive_signal(SIGNAL_DOCUMENT_SUBMITTED)
        .await?
    {
        if document_id.is_empty() || !run.state.record_document(document_id.clone()) {
            debug!(
                merchant_id = %run.merchant_id(),
                document_id = %document_id,
                "Dropping extra document submission"
            );
        }
    }

    Ok(())
}
