// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::{Result, RuntimeError};
use crate::types::InstanceStatus;

use super::{CheckpointRecord, InstanceRecord, Persistence, SignalRecord, retry_checkpoint_id};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations against a pool.
    pub async fn migrate(pool: &SqlitePool) -> Result<()> {
        MIGRATOR
            .run(pool)
            .await
            .map_err(|e| RuntimeError::Persistence {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })
    }

    /// Open (creating if needed) a database file and run migrations.
    ///
    /// Parent directories are created when missing.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RuntimeError::Persistence {
                    operation: "create_dir".to_string(),
                    details: format!("Failed to create directory {:?}: {}", parent, e),
                })?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| RuntimeError::Persistence {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn register_instance(&self, record: &InstanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO instances
                (instance_id, run_id, process_type, parent_id, status, input, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.instance_id)
        .bind(&record.run_id)
        .bind(&record.process_type)
        .bind(&record.parent_id)
        .bind(&record.status)
        .bind(&record.input)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>> {
        let record = sqlx::query_as::<_, InstanceRecord>(
            r#"
            SELECT instance_id, run_id, process_type, parent_id, status,
                   input, output, error, created_at, finished_at
            FROM instances
            WHERE instance_id = ?
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn complete_instance(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        output: Option<&[u8]>,
        error: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE instances
            SET status = ?, output = ?, error = ?, finished_at = ?
            WHERE instance_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(output)
        .bind(error)
        .bind(finished_at)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RuntimeError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            });
        }

        Ok(())
    }

    async fn list_instances(&self, status: Option<InstanceStatus>) -> Result<Vec<InstanceRecord>> {
        let records = sqlx::query_as::<_, InstanceRecord>(
            r#"
            SELECT instance_id, run_id, process_type, parent_id, status,
                   input, output, error, created_at, finished_at
            FROM instances
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at ASC, instance_id ASC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for statement in [
            "DELETE FROM signals WHERE instance_id = ?",
            "DELETE FROM checkpoints WHERE instance_id = ?",
            "DELETE FROM instances WHERE instance_id = ?",
        ] {
            sqlx::query(statement)
                .bind(instance_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (instance_id, checkpoint_id, state, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .bind(state)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

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
        sqlx::query(
            r#"
            INSERT INTO checkpoints (instance_id, checkpoint_id, state, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(instance_id, checkpoint_id) DO UPDATE SET
                state = excluded.state,
                created_at = excluded.created_at
            "#,
        )
        .bind(instance_id)
        .bind(retry_checkpoint_id(checkpoint_id, attempt))
        .bind(error_message.as_bytes())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>> {
        let record = sqlx::query_as::<_, CheckpointRecord>(
            r#"
            SELECT id, instance_id, checkpoint_id, state, created_at
            FROM checkpoints
            WHERE instance_id = ? AND checkpoint_id = ?
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_checkpoints(&self, instance_id: &str) -> Result<Vec<CheckpointRecord>> {
        let records = sqlx::query_as::<_, CheckpointRecord>(
            r#"
            SELECT id, instance_id, checkpoint_id, state, created_at
            FROM checkpoints
            WHERE instance_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn count_checkpoints(&self, instance_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkpoints WHERE instance_id = ?")
            .bind(instance_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn insert_signal(
        &self,
        instance_id: &str,
        signal_name: &str,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO signals (instance_id, signal_name, payload, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(instance_id)
        .bind(signal_name)
        .bind(payload)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn next_signal(
        &self,
        instance_id: &str,
        signal_name: &str,
        after_id: i64,
    ) -> Result<Option<SignalRecord>> {
        let record = sqlx::query_as::<_, SignalRecord>(
            r#"
            SELECT id, instance_id, signal_name, payload, created_at
            FROM signals
            WHERE instance_id = ? AND signal_name = ? AND id > ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(instance_id)
        .bind(signal_name)
        .bind(after_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
