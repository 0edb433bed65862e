// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable Runtime - embedded durable execution for long-running processes
//!
//! A process is an async function over a [`ProcessContext`]. Everything the
//! process learns from the outside world goes through the context and is
//! recorded in a journal, so after a crash the runtime can re-execute the
//! process from the start and reach the same decisions without repeating
//! side effects.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Starter / Worker                         │
//! │        start · resume · signal · query · shutdown             │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   Runtime (this crate)                        │
//! │   live instances · signal wakeups · query handlers            │
//! └──────────────────────────────────────────────────────────────┘
//!           │ spawns                               │
//!           ▼                                      ▼
//! ┌───────────────────────────┐        ┌─────────────────────────┐
//! │  Process::run(ctx, input) │───────▶│  Persistence            │
//! │  journal steps via ctx    │        │  memory | sqlite        │
//! └───────────────────────────┘        └─────────────────────────┘
//! ```
//!
//! # Primitives
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `now` | Logical time (recorded time during replay) |
//! | `side_effect` | Record a non-deterministic value once |
//! | `receive_signal_until` | Race the next signal against a deadline; a queued signal wins ties |
//! | `try_receive_signal` | Non-blocking inbox read |
//! | `set_query_handler` | Serve read-only queries while the instance runs |
//! | `execute_activity` | External call with timeout, backoff and error classification |
//! | `execute_child` | Child process with its own journal, deduplicated by id |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use durable_runtime::{MemoryPersistence, Runtime};
//!
//! let runtime = Runtime::builder()
//!     .persistence(Arc::new(MemoryPersistence::new()))
//!     .build()?;
//!
//! let handle = runtime.start("order-42", Arc::new(MyProcess), input).await?;
//! runtime.signal("order-42", "approved", "yes").await?;
//! let output = handle.result().await?;
//! ```

pub mod activity;
pub mod clock;
pub mod context;
pub mod error;
pub mod persistence;
pub mod process;
pub mod query;
pub mod runtime;
pub mod types;

pub use activity::{ActivityError, ActivityFailure, ActivityResult};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use context::{JournalEntry, ProcessContext};
pub use error::{Result, RuntimeError};
pub use persistence::{
    CheckpointRecord, InstanceRecord, MemoryPersistence, Persistence, SignalRecord,
    SqlitePersistence,
};
pub use process::Process;
pub use runtime::{ProcessHandle, Runtime, RuntimeBuilder};
pub use types::{ActivityOptions, InstanceStatus, RetryPolicy};
