// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable primitives available to a process body.
//!
//! Every primitive that observes the outside world (time, signals, activity
//! outcomes, child results) is a journal step. A step is identified by its
//! position in the body (`step-00000`, `step-00001`, ...) and carries a label.
//! On the first execution the step runs live and its result is saved. On
//! replay the saved result is returned without running the step again, until
//! the first position with no saved result; from there execution is live.
//!
//! | Primitive | Label |
//! |-----------|-------|
//! | [`ProcessContext::side_effect`] | `side-effect:{label}` |
//! | [`ProcessContext::receive_signal_until`] | `signal:{name}` |
//! | [`ProcessContext::try_receive_signal`] | `signal-poll:{name}` |
//! | [`ProcessContext::execute_activity`] | `activity:{name}` |
//! | [`ProcessContext::execute_child`] | `child:{child_id}` |

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::activity::{ActivityError, ActivityFailure, ActivityResult};
use crate::clock::Clock;
use crate::error::{Result, RuntimeError};
use crate::persistence::InstanceRecord;
use crate::process::Process;
use crate::runtime::{Completion, LiveInstance, RuntimeShared, lock};
use crate::types::{ActivityOptions, InstanceStatus};

/// One recorded journal step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub label: String,
    pub recorded_at: DateTime<Utc>,
    pub value: serde_json::Value,
}

impl JournalEntry {
    pub fn decode(state: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(state)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReceivedSignal {
    id: i64,
    payload: String,
}

/// Execution context of one instance.
pub struct ProcessContext {
    instance_id: String,
    shared: Arc<RuntimeShared>,
    live: LiveInstance,
    sequence: AtomicU64,
    replaying: AtomicBool,
    replay_time: Mutex<Option<DateTime<Utc>>>,
    signal_cursors: Mutex<HashMap<String, i64>>,
    ready: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProcessContext {
    pub(crate) async fn open(
        instance_id: String,
        shared: Arc<RuntimeShared>,
        live: LiveInstance,
    ) -> Result<Self> {
        let recorded = shared.persistence.count_checkpoints(&instance_id).await?;
        if recorded > 0 {
            info!(instance_id = %instance_id, recorded, "Replaying journal");
        }

        Ok(Self {
            instance_id,
            shared,
            live,
            sequence: AtomicU64::new(0),
            replaying: AtomicBool::new(recorded > 0),
            replay_time: Mutex::new(None),
            signal_cursors: Mutex::new(HashMap::new()),
            ready: Mutex::new(None),
        })
    }

    /// Report on `ready` when the body reaches its first step.
    pub(crate) fn with_ready(self, ready: oneshot::Sender<()>) -> Self {
        *lock(&self.ready) = Some(ready);
        self
    }

    fn mark_ready(&self) {
        if let Some(ready) = lock(&self.ready).take() {
            let _ = ready.send(());
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Whether the body is still re-executing recorded steps.
    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }

    /// Logical current time.
    ///
    /// While replaying this is the time at which the last replayed step was
    /// recorded, so decisions based on it come out the same as the first time.
    pub fn now(&self) -> DateTime<Utc> {
        if self.is_replaying() {
            if let Some(recorded) = *lock(&self.replay_time) {
                return recorded;
            }
        }
        self.shared.clock.now()
    }

    /// Live clock, for query handlers that run outside the process body.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.shared.clock.clone()
    }

    /// Register a read-only query handler for the lifetime of the instance.
    ///
    /// Registering the same name twice is an error.
    pub fn set_query_handler<T, F>(&self, name: &str, handler: F) -> Result<()>
    where
        T: Serialize,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.live.queries.register(
            name,
            Arc::new(move || Ok(serde_json::to_value(handler())?)),
        )?;
        debug!(instance_id = %self.instance_id, query = %name, "Query handler registered");
        Ok(())
    }

    async fn step<T, F, Fut>(&self, label: &str, run: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.mark_ready();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let checkpoint_id = format!("step-{:05}", sequence);

        if self.is_replaying() {
            let recorded = self
                .shared
                .persistence
                .load_checkpoint(&self.instance_id, &checkpoint_id)
                .await?;

            match recorded {
                Some(record) => {
                    let entry = JournalEntry::decode(&record.state)?;
                    if entry.label != label {
                        return Err(RuntimeError::NonDeterministic {
                            instance_id: self.instance_id.clone(),
                            checkpoint_id,
                            recorded: entry.label,
                            requested: label.to_string(),
                        });
                    }
                    *lock(&self.replay_time) = Some(entry.recorded_at);
                    debug!(
                        instance_id = %self.instance_id,
                        checkpoint_id = %checkpoint_id,
                        label,
                        "Replayed step"
                    );
                    return Ok(serde_json::from_value(entry.value)?);
                }
                None => {
                    self.replaying.store(false, Ordering::SeqCst);
                    info!(
                        instance_id = %self.instance_id,
                        checkpoint_id = %checkpoint_id,
                        "Journal exhausted, continuing live"
                    );
                }
            }
        }

        let value = run(checkpoint_id.clone()).await?;

        let entry = JournalEntry {
            label: label.to_string(),
            recorded_at: self.shared.clock.now(),
            value: serde_json::to_value(&value)?,
        };
        self.shared
            .persistence
            .save_checkpoint(
                &self.instance_id,
                &checkpoint_id,
                &serde_json::to_vec(&entry)?,
                entry.recorded_at,
            )
            .await?;

        Ok(value)
    }

    /// Record a non-deterministic value once; replays return the recorded value.
    pub async fn side_effect<T, F>(&self, label: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.step(&format!("side-effect:{}", label), |_| async move { Ok(f()) })
            .await
    }

    /// Wait for the next signal with the given name until `deadline`.
    ///
    /// Returns `None` when the deadline passes first. The inbox is always
    /// checked before the timer, so a signal that is queued by the time the
    /// deadline is reached wins over the timer.
    #[instrument(skip(self), fields(instance_id = %self.instance_id))]
    pub async fn receive_signal_until(
        &self,
        name: &str,
        deadline: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let received = self
            .step(&format!("signal:{}", name), |_| {
                self.wait_for_signal(name, deadline)
            })
            .await?;
        Ok(self.consume(name, received))
    }

    /// Take the next queued signal with the given name without waiting.
    pub async fn try_receive_signal(&self, name: &str) -> Result<Option<String>> {
        let received = self
            .step(&format!("signal-poll:{}", name), |_| self.next_signal(name))
            .await?;
        Ok(self.consume(name, received))
    }

    fn consume(&self, name: &str, received: Option<ReceivedSignal>) -> Option<String> {
        received.map(|signal| {
            lock(&self.signal_cursors).insert(name.to_string(), signal.id);
            signal.payload
        })
    }

    async fn next_signal(&self, name: &str) -> Result<Option<ReceivedSignal>> {
        let after = lock(&self.signal_cursors).get(name).copied().unwrap_or(0);
        let record = self
            .shared
            .persistence
            .next_signal(&self.instance_id, name, after)
            .await?;

        Ok(record.map(|r| ReceivedSignal {
            id: r.id,
            payload: String::from_utf8_lossy(&r.payload).into_owned(),
        }))
    }

    async fn wait_for_signal(
        &self,
        name: &str,
        deadline: DateTime<Utc>,
    ) -> Result<Option<ReceivedSignal>> {
        loop {
            let notified = self.live.signals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(signal) = self.next_signal(name).await? {
                return Ok(Some(signal));
            }

            let remaining = (deadline - self.shared.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                return Ok(None);
            }
            let wait = match self.shared.signal_poll_interval {
                Some(poll) => poll.min(remaining),
                None => remaining,
            };

            tokio::select! {
                biased;
                _ = &mut notified => {}
                _ = tokio::time::sleep(wait) => {
                    // signals sent at the same instant land before the re-check
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    /// Run an activity under the given options.
    ///
    /// Each attempt is bounded by `start_to_close_timeout`. Failed attempts
    /// are retried with backoff until the policy gives up, and every failed
    /// attempt is written to the audit trail. Only the final outcome is
    /// journaled, so a completed activity is never invoked again on replay.
    #[instrument(skip(self, options, invoke), fields(instance_id = %self.instance_id))]
    pub async fn execute_activity<T, F, Fut>(
        &self,
        activity: &str,
        options: &ActivityOptions,
        invoke: F,
    ) -> Result<ActivityResult<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ActivityError>>,
    {
        self.step(&format!("activity:{}", activity), |checkpoint_id| async move {
            let mut invoke = invoke;
            let policy = &options.retry_policy;
            let mut attempt: u32 = 1;

            loop {
                let outcome =
                    match tokio::time::timeout(options.start_to_close_timeout, invoke()).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ActivityError::timeout(options.start_to_close_timeout)),
                    };

                let error = match outcome {
                    Ok(value) => {
                        debug!(activity, attempt, "Activity completed");
                        return Ok(Ok(value));
                    }
                    Err(error) => error,
                };

                if !policy.is_retryable(&error) {
                    warn!(
                        activity,
                        attempt,
                        error_type = error.error_type(),
                        error = %error,
                        "Activity failed with non-retryable error"
                    );
                    return Ok(Err(ActivityFailure::NonRetryable {
                        activity: activity.to_string(),
                        attempts: attempt,
                        source: error,
                    }));
                }

                if policy.attempts_exhausted(attempt) {
                    warn!(activity, attempt, error = %error, "Activity retries exhausted");
                    return Ok(Err(ActivityFailure::RetriesExhausted {
                        activity: activity.to_string(),
                        attempts: attempt,
                        source: error,
                    }));
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    activity,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Activity attempt failed, retrying"
                );
                self.shared
                    .persistence
                    .save_retry_attempt(
                        &self.instance_id,
                        &checkpoint_id,
                        attempt,
                        &error.to_string(),
                        self.shared.clock.now(),
                    )
                    .await?;

                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        })
        .await
    }

    /// Run a child process under its own id and journal.
    ///
    /// A child id that is already executing is rejected, which keeps at most
    /// one child per id in flight. The child's output is journaled in the
    /// parent; a child that finished before the parent recorded it is not run
    /// again.
    #[instrument(skip(self, process, input), fields(instance_id = %self.instance_id, child_type = P::NAME))]
    pub async fn execute_child<P: Process>(
        &self,
        child_id: &str,
        process: &P,
        input: P::Input,
    ) -> Result<P::Output> {
        self.step(&format!("child:{}", child_id), |_| async move {
            let live = self.shared.claim(child_id).ok_or_else(|| {
                RuntimeError::ChildAlreadyRunning {
                    child_id: child_id.to_string(),
                }
            })?;

            let result = self.drive_child(child_id, process, input, live).await;
            self.shared.release(child_id);
            result
        })
        .await
    }

    async fn drive_child<P: Process>(
        &self,
        child_id: &str,
        process: &P,
        input: P::Input,
        live: LiveInstance,
    ) -> Result<P::Output> {
        let existing = self.shared.persistence.get_instance(child_id).await?;

        let resume = match existing {
            None => false,
            Some(record) => {
                let own = record.parent_id.as_deref() == Some(self.instance_id.as_str());
                match (record.status(), own) {
                    (InstanceStatus::Running, true) => true,
                    (InstanceStatus::Running, false) => {
                        return Err(RuntimeError::ChildAlreadyRunning {
                            child_id: child_id.to_string(),
                        });
                    }
                    (InstanceStatus::Completed, true) if record.output.is_some() => {
                        debug!(child_id = %child_id, "Child finished before parent recorded it");
                        let output = record.output.unwrap_or_default();
                        return Ok(serde_json::from_slice(&output)?);
                    }
                    _ => {
                        self.shared.purge(child_id).await?;
                        false
                    }
                }
            }
        };

        if resume {
            info!(child_id = %child_id, "Resuming child from its journal");
        } else {
            let record = InstanceRecord::running(
                child_id,
                Uuid::new_v4().to_string(),
                P::NAME,
                Some(self.instance_id.clone()),
                serde_json::to_vec(&input)?,
                self.shared.clock.now(),
            );
            self.shared.persistence.register_instance(&record).await?;
            info!(child_id = %child_id, run_id = %record.run_id, "Child started");
        }

        let ctx = ProcessContext::open(child_id.to_string(), self.shared.clone(), live).await?;
        let result = process.run(&ctx, input).await;
        let completion = Completion::of(&result)?;
        self.shared.finish(child_id, completion).await?;
        result
    }
}
