// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for the durable runtime.
//!
//! Three kinds of rows are stored per instance: the instance record itself,
//! journal checkpoints (one per recorded step, plus retry audit rows), and the
//! signal inbox. Signals are ordered by their autoincrement id, which is the
//! delivery order seen by the process.

pub mod memory;
pub mod sqlite;

pub use self::memory::MemoryPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::InstanceStatus;

/// Separator used for retry audit rows stored next to journal checkpoints.
pub const RETRY_CHECKPOINT_MARKER: &str = "::retry::";

/// Checkpoint id of the audit row for a failed activity attempt.
pub fn retry_checkpoint_id(checkpoint_id: &str, attempt: u32) -> String {
    format!("{}{}{}", checkpoint_id, RETRY_CHECKPOINT_MARKER, attempt)
}

/// Whether a checkpoint id refers to a retry audit row.
pub fn is_retry_checkpoint(checkpoint_id: &str) -> bool {
    checkpoint_id.contains(RETRY_CHECKPOINT_MARKER)
}

/// Instance record from the persistence layer.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct InstanceRecord {
    /// Unique identifier for the instance (the idempotency key).
    pub instance_id: String,
    /// Identifier of this particular run of the instance id.
    pub run_id: String,
    /// Registered process type name.
    pub process_type: String,
    /// Parent instance for child processes.
    pub parent_id: Option<String>,
    /// Current status (running, completed, failed).
    pub status: String,
    /// Serialized process input.
    pub input: Vec<u8>,
    /// Serialized output from successful completion.
    pub output: Option<Vec<u8>>,
    /// Error message from failure.
    pub error: Option<String>,
    /// When the instance was started.
    pub created_at: DateTime<Utc>,
    /// When the instance finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    /// New running record.
    pub fn running(
        instance_id: impl Into<String>,
        run_id: impl Into<String>,
        process_type: impl Into<String>,
        parent_id: Option<String>,
        input: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            run_id: run_id.into(),
            process_type: process_type.into(),
            parent_id,
            status: InstanceStatus::Running.as_str().to_string(),
            input,
            output: None,
            error: None,
            created_at,
            finished_at: None,
        }
    }

    /// Parsed status; unknown values are reported as failed.
    pub fn status(&self) -> InstanceStatus {
        self.status.parse().unwrap_or(InstanceStatus::Failed)
    }
}

/// Checkpoint record from the persistence layer.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CheckpointRecord {
    /// Database primary key.
    pub id: i64,
    /// Instance this checkpoint belongs to.
    pub instance_id: String,
    /// Unique checkpoint identifier within the instance.
    pub checkpoint_id: String,
    /// Serialized state data.
    pub state: Vec<u8>,
    /// When the checkpoint was created.
    pub created_at: DateTime<Utc>,
}

/// Signal inbox entry.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SignalRecord {
    /// Delivery sequence number, increasing in send order.
    pub id: i64,
    /// Instance this signal is for.
    pub instance_id: String,
    /// Signal name.
    pub signal_name: String,
    /// Raw payload.
    pub payload: Vec<u8>,
    /// When the signal was sent.
    pub created_at: DateTime<Utc>,
}

/// Persistence interface used by the runtime.
#[allow(missing_docs)]
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Insert a new instance record. Fails if the id already exists.
    async fn register_instance(&self, record: &InstanceRecord) -> Result<()>;

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>>;

    /// Mark an instance finished with either an output or an error.
    async fn complete_instance(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        output: Option<&[u8]>,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn list_instances(&self, status: Option<InstanceStatus>) -> Result<Vec<InstanceRecord>>;

    /// Remove an instance together with its journal and inbox.
    async fn delete_instance(&self, instance_id: &str) -> Result<()>;

    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>>;

    /// All checkpoints of an instance in insertion order.
    async fn list_checkpoints(&self, instance_id: &str) -> Result<Vec<CheckpointRecord>>;

    async fn count_checkpoints(&self, instance_id: &str) -> Result<i64>;

    /// Record a failed activity attempt in the audit trail.
    ///
    /// Stored as a checkpoint row under [`retry_checkpoint_id`]. Re-running a
    /// step after a crash overwrites the rows of its earlier attempts.
    async fn save_retry_attempt(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        attempt: u32,
        error_message: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Append a signal to the inbox and return its sequence number.
    async fn insert_signal(
        &self,
        instance_id: &str,
        signal_name: &str,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<i64>;

    /// Oldest signal with the given name whose sequence number is above `after_id`.
    async fn next_signal(
        &self,
        instance_id: &str,
        signal_name: &str,
        after_id: i64,
    ) -> Result<Option<SignalRecord>>;
}
