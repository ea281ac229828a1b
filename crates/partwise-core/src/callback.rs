//! Registry of named partition-creation callbacks.
//!
//! A parent's `init_callback` configuration names a handler registered
//! here; DDL operations resolve the name and invoke the handler
//! synchronously, inside the creating transaction, once per partition
//! created. A handler error aborts the whole transaction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result, StateError};

/// A registered callback: receives a JSON description of the new partition
/// (`parent`, `partition`, `parttype`, and range bounds when applicable).
pub type InitCallback = Arc<dyn Fn(&serde_json::Value) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct CallbackRegistry {
    handlers: RwLock<HashMap<String, InitCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a handler under `name`.
    pub fn register<F>(&self, name: &str, handler: F)
    where
        F: Fn(&serde_json::Value) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .insert(name.to_string(), Arc::new(handler));
    }

    /// Whether a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Invoke the handler registered under `name`.
    pub fn invoke(&self, name: &str, arg: &serde_json::Value) -> Result<()> {
        let handler = self
            .handlers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::from(StateError::CallbackNotRegistered(name.to_string())))?;
        handler(arg)
    }
}
