// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory persistence.
//!
//! State lives as long as the value, so sharing one `Arc<MemoryPersistence>`
//! between two runtimes is enough to exercise crash recovery in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{Result, RuntimeError};
use crate::types::InstanceStatus;

use super::{CheckpointRecord, InstanceRecord, Persistence, SignalRecord, retry_checkpoint_id};

#[derive(Default)]
struct State {
    instances: HashMap<String, InstanceRecord>,
    checkpoints: Vec<CheckpointRecord>,
    signals: Vec<SignalRecord>,
    next_id: i64,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Persistence backed by process memory.
#[derive(Default)]
pub struct MemoryPersistence {
    state: RwLock<State>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn register_instance(&self, record: &InstanceRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.instances.contains_key(&record.instance_id) {
            return Err(RuntimeError::Persistence {
                operation: "register_instance".to_string(),
                details: format!("instance '{}' already exists", record.instance_id),
            });
        }
        state
            .instances
            .insert(record.instance_id.clone(), record.clone());
        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.state.read().await.instances.get(instance_id).cloned())
    }

    async fn complete_instance(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        output: Option<&[u8]>,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.instances.get_mut(instance_id).ok_or_else(|| {
            RuntimeError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            }
        })?;
        record.status = status.as_str().to_string();
        record.output = output.map(<[u8]>::to_vec);
        record.error = error.map(str::to_string);
        record.finished_at = Some(finished_at);
        Ok(())
    }

    async fn list_instances(&self, status: Option<InstanceStatus>) -> Result<Vec<InstanceRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<InstanceRecord> = state
            .instances
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s.as_str()))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.instance_id.cmp(&b.instance_id))
        });
        Ok(records)
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.instances.remove(instance_id);
        state.checkpoints.retain(|c| c.instance_id != instance_id);
        state.signals.retain(|s| s.instance_id != instance_id);
        Ok(())
    }

    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state_bytes: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .checkpoints
            .iter()
            .any(|c| c.instance_id == instance_id && c.checkpoint_id == checkpoint_id)
        {
            return Err(RuntimeError::Persistence {
                operation: "save_checkpoint".to_string(),
                details: format!(
                    "checkpoint '{}' already exists for instance '{}'",
                    checkpoint_id, instance_id
                ),
            });
        }
        let id = state.allocate_id();
        state.checkpoints.push(CheckpointRecord {
            id,
            instance_id: instance_id.to_string(),
            checkpoint_id: checkpoint_id.to_string(),
            state: state_bytes.to_vec(),
            created_at,
        });
        Ok(())
    }

    async fn save_retry_attempt(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        attempt: u32,
        error_message: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let retry_id = retry_checkpoint_id(checkpoint_id, attempt);
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .checkpoints
            .iter_mut()
            .find(|c| c.instance_id == instance_id && c.checkpoint_id == retry_id)
        {
            existing.state = error_message.as_bytes().to_vec();
            existing.created_at = created_at;
            return Ok(());
        }
        let id = state.allocate_id();
        state.checkpoints.push(CheckpointRecord {
            id,
            instance_id: instance_id.to_string(),
            checkpoint_id: retry_id,
            state: error_message.as_bytes().to_vec(),
            created_at,
        });
        Ok(())
    }

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>> {
        let state = self.state.read().await;
        Ok(state
            .checkpoints
            .iter()
            .find(|c| c.instance_id == instance_id && c.checkpoint_id == checkpoint_id)
            .cloned())
    }

    async fn list_checkpoints(&self, instance_id: &str) -> Result<Vec<CheckpointRecord>> {
        let state = self.state.read().await;
        Ok(state
            .checkpoints
            .iter()
            .filter(|c| c.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn count_checkpoints(&self, instance_id: &str) -> Result<i64> {
        let state = self.state.read().await;
        let count = state
            .checkpoints
            .iter()
            .filter(|c| c.instance_id == instance_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn insert_signal(
        &self,
        instance_id: &str,
        signal_name: &str,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        state.signals.push(SignalRecord {
            id,
            instance_id: instance_id.to_string(),
            signal_name: signal_name.to_string(),
            payload: payload.to_vec(),
            created_at,
        });
        Ok(id)
    }

    async fn next_signal(
        &self,
        instance_id: &str,
        signal_name: &str,
        after_id: i64,
    ) -> Result<Option<SignalRecord>> {
        let state = self.state.read().await;
        Ok(state
            .signals
            .iter()
            .filter(|s| {
                s.instance_id == instance_id && s.signal_name == signal_name && s.id > after_id
            })
            .min_by_key(|s| s.id)
            .cloned())
    }
}
