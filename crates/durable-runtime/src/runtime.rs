// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtime lifecycle: start, resume, signal, query and shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Notify, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::context::ProcessContext;
use crate::error::{Result, RuntimeError};
use crate::persistence::{InstanceRecord, Persistence};
use crate::process::Process;
use crate::query::QueryRegistry;
use crate::types::InstanceStatus;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory handles of an instance executing in this runtime.
#[derive(Clone, Default)]
pub(crate) struct LiveInstance {
    pub(crate) signals: Arc<Notify>,
    pub(crate) queries: QueryRegistry,
}

/// Final record of a run, detached from the run's result.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Completion {
    pub(crate) status: InstanceStatus,
    pub(crate) output: Option<Vec<u8>>,
    pub(crate) error: Option<String>,
}

impl Completion {
    pub(crate) fn of<T: Serialize>(result: &Result<T>) -> Result<Self> {
        Ok(match result {
            Ok(output) => Self {
                status: InstanceStatus::Completed,
                output: Some(serde_json::to_vec(output)?),
                error: None,
            },
            Err(e) => Self {
                status: InstanceStatus::Failed,
                output: None,
                error: Some(e.to_string()),
            },
        })
    }
}

/// State shared by the runtime and every process context it creates.
pub(crate) struct RuntimeShared {
    pub(crate) persistence: Arc<dyn Persistence>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) signal_poll_interval: Option<Duration>,
    live: Mutex<HashMap<String, LiveInstance>>,
}

impl RuntimeShared {
    /// Mark an id as executing. `None` if it already is.
    pub(crate) fn claim(&self, instance_id: &str) -> Option<LiveInstance> {
        let mut live = lock(&self.live);
        if live.contains_key(instance_id) {
            return None;
        }
        let instance = LiveInstance::default();
        live.insert(instance_id.to_string(), instance.clone());
        Some(instance)
    }

    pub(crate) fn release(&self, instance_id: &str) {
        lock(&self.live).remove(instance_id);
    }

    pub(crate) fn live_instance(&self, instance_id: &str) -> Option<LiveInstance> {
        lock(&self.live).get(instance_id).cloned()
    }

    /// Record the final outcome of an instance.
    pub(crate) async fn finish(&self, instance_id: &str, completion: Completion) -> Result<()> {
        self.persistence
            .complete_instance(
                instance_id,
                completion.status,
                completion.output.as_deref(),
                completion.error.as_deref(),
                self.clock.now(),
            )
            .await
    }

    /// Delete a finished instance and the children it spawned.
    pub(crate) async fn purge(&self, instance_id: &str) -> Result<()> {
        let children: Vec<String> = self
            .persistence
            .list_instances(None)
            .await?
            .into_iter()
            .filter(|r| r.parent_id.as_deref() == Some(instance_id))
            .map(|r| r.instance_id)
            .collect();
        for child in children {
            self.persistence.delete_instance(&child).await?;
        }
        self.persistence.delete_instance(instance_id).await
    }
}

/// Builder for creating a [`Runtime`].
pub struct RuntimeBuilder {
    persistence: Option<Arc<dyn Persistence>>,
    clock: Arc<dyn Clock>,
    signal_poll_interval: Option<Duration>,
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("persistence", &self.persistence.as_ref().map(|_| "..."))
            .field("signal_poll_interval", &self.signal_poll_interval)
            .finish()
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self {
            persistence: None,
            clock: Arc::new(SystemClock),
            signal_poll_interval: None,
        }
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persistence layer (required).
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the time source.
    ///
    /// Default: [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Re-check the signal inbox at this interval while waiting.
    ///
    /// Needed only when signals are written to shared storage by another
    /// process; signals sent through [`Runtime::signal`] wake waiters directly.
    pub fn signal_poll_interval(mut self, interval: Duration) -> Self {
        self.signal_poll_interval = Some(interval);
        self
    }

    /// Build the runtime.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<Runtime> {
        let persistence = self
            .persistence
            .ok_or_else(|| RuntimeError::Config("persistence is required".to_string()))?;

        if self.signal_poll_interval == Some(Duration::ZERO) {
            return Err(RuntimeError::Config(
                "signal poll interval must be greater than zero".to_string(),
            ));
        }

        Ok(Runtime {
            shared: Arc::new(RuntimeShared {
                persistence,
                clock: self.clock,
                signal_poll_interval: self.signal_poll_interval,
                live: Mutex::new(HashMap::new()),
            }),
            tasks: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

/// Embedded durable runtime.
///
/// Cloning is cheap; clones share persistence, the clock and the set of live
/// instances.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<RuntimeShared>,
    tasks: Arc<Mutex<Vec<AbortHandle>>>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.shared.persistence
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    /// Start a new instance.
    ///
    /// The instance id is the idempotency key: a start is rejected while an
    /// instance with the same id is live here or persisted as running. A
    /// finished instance is discarded and started afresh under a new run id.
    ///
    /// Returns once the body has reached its first journal step (or ended),
    /// so query handlers registered before that step are already answerable.
    #[instrument(skip(self, process, input), fields(process_type = P::NAME))]
    pub async fn start<P: Process>(
        &self,
        instance_id: &str,
        process: Arc<P>,
        input: P::Input,
    ) -> Result<ProcessHandle<P::Output>> {
        let live = self
            .shared
            .claim(instance_id)
            .ok_or_else(|| RuntimeError::InstanceAlreadyRunning {
                instance_id: instance_id.to_string(),
            })?;

        match self.register(instance_id, P::NAME, &input).await {
            Ok(run_id) => {
                info!(instance_id = %instance_id, run_id = %run_id, "Instance started");
                Ok(self.spawn(instance_id, run_id, process, input, live).await)
            }
            Err(e) => {
                self.shared.release(instance_id);
                Err(e)
            }
        }
    }

    async fn register<I: Serialize>(
        &self,
        instance_id: &str,
        process_type: &str,
        input: &I,
    ) -> Result<String> {
        if let Some(existing) = self.shared.persistence.get_instance(instance_id).await? {
            if existing.status() == InstanceStatus::Running {
                return Err(RuntimeError::InstanceAlreadyRunning {
                    instance_id: instance_id.to_string(),
                });
            }
            debug!(
                instance_id = %instance_id,
                previous_run_id = %existing.run_id,
                "Discarding finished run"
            );
            self.shared.purge(instance_id).await?;
        }

        let run_id = Uuid::new_v4().to_string();
        let record = InstanceRecord::running(
            instance_id,
            run_id.clone(),
            process_type,
            None,
            serde_json::to_vec(input)?,
            self.shared.clock.now(),
        );
        self.shared.persistence.register_instance(&record).await?;
        Ok(run_id)
    }

    /// Re-execute a persisted running instance from its journal.
    ///
    /// Used after a worker restart. Recorded steps are replayed without
    /// repeating their side effects; execution continues live from the first
    /// unrecorded step.
    #[instrument(skip(self, process), fields(process_type = P::NAME))]
    pub async fn resume<P: Process>(
        &self,
        instance_id: &str,
        process: Arc<P>,
    ) -> Result<ProcessHandle<P::Output>> {
        let record = self
            .shared
            .persistence
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| RuntimeError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })?;

        if record.status().is_terminal() {
            return Err(RuntimeError::InstanceNotRunning {
                instance_id: instance_id.to_string(),
            });
        }
        if record.process_type != P::NAME {
            return Err(RuntimeError::ProcessTypeMismatch {
                instance_id: instance_id.to_string(),
                expected: P::NAME.to_string(),
                actual: record.process_type,
            });
        }

        let input: P::Input = serde_json::from_slice(&record.input)?;
        let live = self
            .shared
            .claim(instance_id)
            .ok_or_else(|| RuntimeError::InstanceAlreadyRunning {
                instance_id: instance_id.to_string(),
            })?;

        info!(instance_id = %instance_id, run_id = %record.run_id, "Resuming instance from journal");
        Ok(self.spawn(instance_id, record.run_id, process, input, live).await)
    }

    /// Resume every running top-level instance of the given process type.
    ///
    /// Child instances are skipped; their parents drive them again on replay.
    pub async fn resume_all<P: Process>(
        &self,
        process: Arc<P>,
    ) -> Result<Vec<ProcessHandle<P::Output>>> {
        let records = self
            .shared
            .persistence
            .list_instances(Some(InstanceStatus::Running))
            .await?;

        let mut handles = Vec::new();
        for record in records
            .into_iter()
            .filter(|r| r.parent_id.is_none() && r.process_type == P::NAME)
        {
            if self.shared.live_instance(&record.instance_id).is_some() {
                continue;
            }
            handles.push(self.resume(&record.instance_id, process.clone()).await?);
        }

        info!(count = handles.len(), process_type = P::NAME, "Resumed in-flight instances");
        Ok(handles)
    }

    async fn spawn<P: Process>(
        &self,
        instance_id: &str,
        run_id: String,
        process: Arc<P>,
        input: P::Input,
        live: LiveInstance,
    ) -> ProcessHandle<P::Output> {
        let shared = self.shared.clone();
        let id = instance_id.to_string();
        let (ready_tx, ready_rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            let result = match ProcessContext::open(id.clone(), shared.clone(), live).await {
                Ok(ctx) => {
                    let ctx = ctx.with_ready(ready_tx);
                    process.run(&ctx, input).await
                }
                Err(e) => Err(e),
            };

            match &result {
                Ok(_) => info!(instance_id = %id, "Instance completed"),
                Err(e) => error!(instance_id = %id, error = %e, "Instance failed"),
            }

            let recorded = match Completion::of(&result) {
                Ok(completion) => shared.finish(&id, completion).await,
                Err(e) => Err(e),
            };
            shared.release(&id);
            recorded?;
            result
        });

        {
            let mut tasks = lock(&self.tasks);
            tasks.retain(|task| !task.is_finished());
            tasks.push(join.abort_handle());
        }

        // The sender is dropped unsent when the instance ends before any step.
        let _ = ready_rx.await;

        ProcessHandle {
            instance_id: instance_id.to_string(),
            run_id,
            join,
        }
    }

    /// Deliver a signal.
    ///
    /// The signal is appended to the durable inbox first, so it is never lost
    /// if the instance is not currently executing; it is consumed on resume.
    #[instrument(skip(self, payload))]
    pub async fn signal(&self, instance_id: &str, name: &str, payload: &str) -> Result<()> {
        let record = self
            .shared
            .persistence
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| RuntimeError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })?;

        if record.status().is_terminal() {
            return Err(RuntimeError::InstanceNotRunning {
                instance_id: instance_id.to_string(),
            });
        }

        let signal_id = self
            .shared
            .persistence
            .insert_signal(instance_id, name, payload.as_bytes(), self.shared.clock.now())
            .await?;

        match self.shared.live_instance(instance_id) {
            Some(live) => live.signals.notify_one(),
            None => debug!(instance_id = %instance_id, "Signal queued for an instance not live here"),
        }

        debug!(instance_id = %instance_id, signal = %name, signal_id, "Signal delivered");
        Ok(())
    }

    /// Evaluate a query handler of a live instance.
    pub fn query<T: DeserializeOwned>(&self, instance_id: &str, name: &str) -> Result<T> {
        let live = self.shared.live_instance(instance_id).ok_or_else(|| {
            RuntimeError::InstanceNotRunning {
                instance_id: instance_id.to_string(),
            }
        })?;

        let value = live
            .queries
            .evaluate(name)
            .ok_or_else(|| RuntimeError::QueryNotFound {
                instance_id: instance_id.to_string(),
                name: name.to_string(),
            })??;

        Ok(serde_json::from_value(value)?)
    }

    /// Abort every live instance without recording completion.
    ///
    /// Journals stay as they are, so a new runtime over the same persistence
    /// can [`resume`](Self::resume) them.
    pub fn shutdown(&self) {
        let mut tasks = lock(&self.tasks);
        let aborted = tasks.len();
        for task in tasks.drain(..) {
            task.abort();
        }
        lock(&self.shared.live).clear();
        warn!(aborted, "Runtime shut down");
    }
}

/// Handle to a started instance.
pub struct ProcessHandle<T> {
    instance_id: String,
    run_id: String,
    join: JoinHandle<Result<T>>,
}

impl<T> ProcessHandle<T> {
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the instance outcome.
    pub async fn result(self) -> Result<T> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(RuntimeError::Cancelled {
                instance_id: self.instance_id,
            }),
            Err(e) => Err(RuntimeError::Internal(format!(
                "instance '{}' panicked: {}",
                self.instance_id, e
            ))),
        }
    }
}
