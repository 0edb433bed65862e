// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use onboarding_workflows::{Activities, SeededFaults, StubActivities, Timeline};

/// Onboarding worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file shared by the worker and the signal command
    pub database_path: PathBuf,
    /// Length of one onboarding day
    pub timeline: Timeline,
    /// How often a waiting instance re-reads the signal inbox
    pub signal_poll_interval: Duration,
    /// Probability of a transient supplier failure per attempt
    pub supplier_fault_rate: f64,
    /// Seed of the supplier fault sequence
    pub supplier_fault_seed: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `ONBOARDING_DATABASE_PATH`: SQLite database file
    ///
    /// Optional (with defaults):
    /// - `ONBOARDING_DAY_LENGTH_MS`: length of a day (default: 86400000)
    /// - `ONBOARDING_SIGNAL_POLL_INTERVAL_MS`: inbox poll interval (default: 1000)
    /// - `ONBOARDING_SUPPLIER_FAULT_RATE`: between 0 and 1 (default: 0)
    /// - `ONBOARDING_SUPPLIER_FAULT_SEED`: fault sequence seed (default: 42)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path = std::env::var("ONBOARDING_DATABASE_PATH")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::Missing("ONBOARDING_DATABASE_PATH"))?;

        let day_length_ms: u64 = std::env::var("ONBOARDING_DAY_LENGTH_MS")
            .unwrap_or_else(|_| "86400000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("ONBOARDING_DAY_LENGTH_MS", "must be a positive integer")
            })?;
        let timeline = Timeline::with_day_length(Duration::from_millis(day_length_ms)).ok_or(
            ConfigError::Invalid("ONBOARDING_DAY_LENGTH_MS", "must be greater than zero"),
        )?;

        let poll_ms: u64 = std::env::var("ONBOARDING_SIGNAL_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "ONBOARDING_SIGNAL_POLL_INTERVAL_MS",
                    "must be a positive integer",
                )
            })?;
        if poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "ONBOARDING_SIGNAL_POLL_INTERVAL_MS",
                "must be greater than zero",
            ));
        }

        let supplier_fault_rate: f64 = std::env::var("ONBOARDING_SUPPLIER_FAULT_RATE")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("ONBOARDING_SUPPLIER_FAULT_RATE", "must be a number")
            })?;
        if !(0.0..=1.0).contains(&supplier_fault_rate) {
            return Err(ConfigError::Invalid(
                "ONBOARDING_SUPPLIER_FAULT_RATE",
                "must be between 0 and 1",
            ));
        }

        let supplier_fault_seed: u64 = std::env::var("ONBOARDING_SUPPLIER_FAULT_SEED")
            .unwrap_or_else(|_| "42".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "ONBOARDING_SUPPLIER_FAULT_SEED",
                    "must be an unsigned integer",
                )
            })?;

        Ok(Self {
            database_path,
            timeline,
            signal_poll_interval: Duration::from_millis(poll_ms),
            supplier_fault_rate,
            supplier_fault_seed,
        })
    }

    /// Stub activities, with seeded supplier faults when a rate is set.
    pub fn activities(&self) -> Arc<dyn Activities> {
        let stub = StubActivities::new();
        if self.supplier_fault_rate > 0.0 {
            Arc::new(stub.with_supplier_faults(SeededFaults::new(
                self.supplier_fault_seed,
                self.supplier_fault_rate,
            )))
        } else {
            Arc::new(stub)
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
