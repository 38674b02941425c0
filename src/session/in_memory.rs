//! In-memory session store
//!
//! Backed by a `HashMap` behind an async `RwLock`. Clones share the same
//! map, so a cloned store stands in for "the same session" in tests.

use crate::error::Result;
use crate::session::store::SessionStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session store keeping values in process memory.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every key currently held, for inspection in tests.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().await.clone()
    }

    /// Drop every key.
    pub async fn clear(&self) {
        self.values.write().await.clear();
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
