//! Session storage trait
//!
//! Abstracts the session key/value surface so the crate works against any
//! framework's session implementation. A store instance is scoped to one
//! session; the crate removes its own keys on logout rather than touching
//! anything else the application keeps there.

use crate::error::Result;
use async_trait::async_trait;

/// Narrow key/value contract over the current session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read a value.
    ///
    /// Returns `Ok(None)` when the key was never written or was removed.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// No-op implementation for stateless flows: reads see nothing, writes go
/// nowhere.
#[async_trait]
impl SessionStore for () {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}
