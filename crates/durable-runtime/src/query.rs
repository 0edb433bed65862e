// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read-only query handlers registered by a live instance.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::error::{Result, RuntimeError};

/// Query callback. Must only read state.
pub type QueryHandler = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Named query handlers of one instance.
#[derive(Clone, Default)]
pub struct QueryRegistry {
    handlers: Arc<RwLock<HashMap<String, QueryHandler>>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A name can be registered once per instance.
    pub fn register(&self, name: &str, handler: QueryHandler) -> Result<()> {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if handlers.contains_key(name) {
            return Err(RuntimeError::QueryHandlerExists {
                name: name.to_string(),
            });
        }
        handlers.insert(name.to_string(), handler);
        Ok(())
    }

    /// Evaluate a handler. Returns `None` when no handler has that name.
    pub fn evaluate(&self, name: &str) -> Option<Result<Value>> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        Some(handler())
    }
}
