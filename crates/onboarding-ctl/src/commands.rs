// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subcommand implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use durable_runtime::persistence::is_retry_checkpoint;
use durable_runtime::{
    CheckpointRecord, InstanceRecord, JournalEntry, Persistence, ProcessHandle, Runtime,
    RuntimeError,
};
use onboarding_workflows::{
    MerchantInfo, OnboardingProcess, OnboardingRequest, OnboardingStatusResponse,
    QUERY_ONBOARDING_STATUS, SIGNAL_DOCUMENT_SUBMITTED, Timeline, kyc_child_id,
    onboarding_instance_id,
};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Config;

/// Document to submit while a started onboarding runs.
#[derive(Debug, Clone)]
pub struct Submission {
    pub document_id: String,
    pub after_days: u32,
}

fn onboarding_process(config: &Config) -> Arc<OnboardingProcess> {
    Arc::new(OnboardingProcess::with_timeline(
        config.activities(),
        config.timeline,
    ))
}

/// Start onboarding for a merchant and wait for its outcome.
pub async fn start(
    runtime: &Runtime,
    config: &Config,
    merchant: MerchantInfo,
    submission: Option<Submission>,
    status_every_days: Option<u32>,
) -> Result<()> {
    let instance_id = onboarding_instance_id(&merchant.merchant_id);
    let request = OnboardingRequest::new(merchant, Utc::now());

    let handle = runtime
        .start(&instance_id, onboarding_process(config), request)
        .await
        .with_context(|| format!("failed to start {}", instance_id))?;
    info!(instance_id = %instance_id, run_id = %handle.run_id(), "Onboarding started");

    let mut helpers = Vec::new();
    if let Some(submission) = submission {
        helpers.push(tokio::spawn(submit_later(
            runtime.clone(),
            instance_id.clone(),
            submission,
            config.timeline,
        )));
    }
    if let Some(days) = status_every_days {
        helpers.push(tokio::spawn(report_status(
            runtime.clone(),
            instance_id.clone(),
            config.timeline.day_length().saturating_mul(days),
        )));
    }

    let finished = await_outcomes(runtime, vec![handle]).await;
    for helper in helpers {
        helper.abort();
    }
    finished
}

/// Append a document to the inbox of a running onboarding.
pub async fn signal(runtime: &Runtime, merchant_id: &str, document_id: &str) -> Result<()> {
    let instance_id = onboarding_instance_id(merchant_id);
    runtime
        .signal(&instance_id, SIGNAL_DOCUMENT_SUBMITTED, document_id)
        .await
        .with_context(|| format!("failed to signal {}", instance_id))?;

    println!("Submitted document {} to {}", document_id, instance_id);
    Ok(())
}

/// Resume every in-flight onboarding and wait for the outcomes.
pub async fn resume(runtime: &Runtime, config: &Config) -> Result<()> {
    let handles = runtime
        .resume_all(onboarding_process(config))
        .await
        .context("failed to resume onboarding instances")?;

    if handles.is_empty() {
        println!("No onboarding in flight");
        return Ok(());
    }
    await_outcomes(runtime, handles).await
}

/// Print the persisted records of a merchant's onboarding and KYC child.
pub async fn status(persistence: &dyn Persistence, merchant_id: &str) -> Result<()> {
    let instance_id = onboarding_instance_id(merchant_id);
    let Some(record) = persistence.get_instance(&instance_id).await? else {
        bail!("no onboarding found for merchant {}", merchant_id);
    };
    println!("{}", describe_instance(&record));

    if let Some(child) = persistence.get_instance(&kyc_child_id(merchant_id)).await? {
        println!("{}", describe_instance(&child));
    }
    Ok(())
}

/// Print the journals of a merchant's onboarding and KYC child.
pub async fn history(persistence: &dyn Persistence, merchant_id: &str) -> Result<()> {
    let mut printed = false;
    for instance_id in [onboarding_instance_id(merchant_id), kyc_child_id(merchant_id)] {
        let checkpoints = persistence.list_checkpoints(&instance_id).await?;
        if checkpoints.is_empty() {
            continue;
        }
        printed = true;
        println!("{}", instance_id);
        for checkpoint in &checkpoints {
            println!("  {}", describe_checkpoint(checkpoint));
        }
    }

    if !printed {
        bail!("no journal found for merchant {}", merchant_id);
    }
    Ok(())
}

async fn await_outcomes(runtime: &Runtime, handles: Vec<ProcessHandle<String>>) -> Result<()> {
    let outcomes = async {
        let mut failed = 0usize;
        for handle in handles {
            let instance_id = handle.instance_id().to_string();
            match handle.result().await {
                Ok(outcome) => println!("{}: {}", instance_id, outcome),
                Err(e) => {
                    error!(instance_id = %instance_id, error = %e, "Onboarding failed");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            bail!("{} onboarding instance(s) failed", failed);
        }
        Ok(())
    };

    tokio::select! {
        result = outcomes => result,
        _ = tokio::signal::ctrl_c() => {
            runtime.shutdown();
            warn!("Interrupted; run `onboarding-ctl resume` to continue");
            Ok(())
        }
    }
}

async fn submit_later(
    runtime: Runtime,
    instance_id: String,
    submission: Submission,
    timeline: Timeline,
) {
    tokio::time::sleep(timeline.day_length().saturating_mul(submission.after_days)).await;

    match runtime
        .signal(&instance_id, SIGNAL_DOCUMENT_SUBMITTED, &submission.document_id)
        .await
    {
        Ok(()) => info!(
            instance_id = %instance_id,
            document_id = %submission.document_id,
            after_days = submission.after_days,
            "Document submitted"
        ),
        Err(e) => warn!(instance_id = %instance_id, error = %e, "Document submission failed"),
    }
}

async fn report_status(runtime: Runtime, instance_id: String, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match runtime.query::<OnboardingStatusResponse>(&instance_id, QUERY_ONBOARDING_STATUS) {
            Ok(response) => match serde_json::to_string(&response) {
                Ok(json) => println!("{}: {}", instance_id, json),
                Err(e) => warn!(error = %e, "Failed to encode status"),
            },
            Err(RuntimeError::InstanceNotRunning { .. }) => break,
            Err(e) => warn!(instance_id = %instance_id, error = %e, "Status query failed"),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn describe_instance(record: &InstanceRecord) -> String {
    let mut lines = vec![format!(
        "{} [{}] {}",
        record.instance_id, record.process_type, record.status
    )];
    lines.push(format!("  run:      {}", record.run_id));
    if let Some(parent_id) = &record.parent_id {
        lines.push(format!("  parent:   {}", parent_id));
    }
    lines.push(format!("  created:  {}", record.created_at.to_rfc3339()));
    if let Some(finished_at) = record.finished_at {
        lines.push(format!("  finished: {}", finished_at.to_rfc3339()));
    }
    if let Some(output) = &record.output {
        let shown = serde_json::from_slice::<Value>(output)
            .map(|v| display_value(&v))
            .unwrap_or_else(|_| String::from_utf8_lossy(output).into_owned());
        lines.push(format!("  output:   {}", shown));
    }
    if let Some(error) = &record.error {
        lines.push(format!("  error:    {}", error));
    }
    lines.join("\n")
}

fn describe_checkpoint(checkpoint: &CheckpointRecord) -> String {
    if is_retry_checkpoint(&checkpoint.checkpoint_id) {
        return format!(
            "{}  {}  retry  {}",
            checkpoint.checkpoint_id,
            checkpoint.created_at.to_rfc3339(),
            String::from_utf8_lossy(&checkpoint.state)
        );
    }

    match JournalEntry::decode(&checkpoint.state) {
        Ok(entry) => format!(
            "{}  {}  {}  {}",
            checkpoint.checkpoint_id,
            entry.recorded_at.to_rfc3339(),
            entry.label,
            entry.value
        ),
        Err(_) => format!("{}  <undecodable>", checkpoint.checkpoint_id),
    }
}
