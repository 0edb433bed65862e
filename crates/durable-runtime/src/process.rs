// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The process trait implemented by durable process definitions.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::ProcessContext;
use crate::error::Result;

/// A durable process definition.
///
/// `run` may be executed more than once for the same instance: after a crash
/// the runtime replays it from the start against the recorded journal. The
/// body must therefore be deterministic between [`ProcessContext`] calls and
/// must take time, signals, external calls and child results only from the
/// context.
#[async_trait]
pub trait Process: Send + Sync + 'static {
    /// Process type name, stored with every instance.
    const NAME: &'static str;

    type Input: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;

    async fn run(&self, ctx: &ProcessContext, input: Self::Input) -> Result<Self::Output>;
}
