//! Remember-device bypass tokens.
//!
//! After a successful check the user may be handed a long-lived token that
//! lets the same browser skip the challenge until it expires. The storage
//! trait is implemented by the application against its database; the manager
//! owns generation, retry, and the fail-closed policy around it.
//!
//! # Security
//!
//! - Tokens are bearer credentials drawn from the operating system RNG
//! - Uniqueness is the store's job (unique constraint), not the generator's;
//!   the manager retries a bounded number of times on conflict
//! - A store outage degrades to "feature unavailable": validation fails
//!   closed, issuance is skipped, revocation is logged and swallowed
//!
//! # Example
//!
//! ```rust,ignore
//! use twostep::{BypassTokenManager, InMemoryBypassTokenStore};
//!
//! let manager = BypassTokenManager::new(InMemoryBypassTokenStore::new());
//!
//! // After a successful check, hand the token back as a cookie.
//! if let Some(token) = manager.issue("user-123", 86_400).await {
//!     // set cookie
//! }
//!
//! // On the next request, let a valid token skip the challenge.
//! if manager.is_valid("user-123", &token).await {
//!     // skip OTP
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::recovery::RandomStringGenerator;

/// Length of a bypass token in characters.
pub const TOKEN_LENGTH: usize = 64;

/// How many times issuance retries after a uniqueness conflict before
/// giving up.
pub const MAX_ISSUE_ATTEMPTS: usize = 10;

/// A persisted remember-device credential.
///
/// One user may hold several at once, one per device or browser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BypassToken {
    /// The 64-character bearer credential. Globally unique.
    pub token: String,
    /// The user this token belongs to.
    pub user_id: String,
    /// When the token stops being valid.
    pub expires_at: SystemTime,
}

impl BypassToken {
    /// Whether the token has outlived `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at <= now
    }
}

/// Trait for bypass token storage.
///
/// Maps onto a table shaped `{id, user_id, expires_at, token(unique)}`.
/// Implementations must reject an insert whose `token` already exists.
#[async_trait]
pub trait BypassTokenStore: Send + Sync {
    /// Persist a new token. Must fail when `record.token` already exists.
    async fn insert(&self, record: &BypassToken) -> anyhow::Result<()>;

    /// Whether a row matches `user_id` and `token` with `expires_at` after
    /// `now`.
    async fn contains_valid(&self, user_id: &str, token: &str, now: SystemTime)
    -> anyhow::Result<bool>;

    /// Delete the row matching `user_id` and `token`. Deleting an absent
    /// row is not an error.
    async fn delete(&self, user_id: &str, token: &str) -> anyhow::Result<()>;

    /// Delete every row with `expires_at` at or before `now`, returning how
    /// many were removed.
    async fn delete_expired(&self, now: SystemTime) -> anyhow::Result<usize>;
}

#[async_trait]
impl<S: BypassTokenStore + ?Sized> BypassTokenStore for Arc<S> {
    async fn insert(&self, record: &BypassToken) -> anyhow::Result<()> {
        (**self).insert(record).await
    }

    async fn contains_valid(
        &self,
        user_id: &str,
        token: &str,
        now: SystemTime,
    ) -> anyhow::Result<bool> {
        (**self).contains_valid(user_id, token, now).await
    }

    async fn delete(&self, user_id: &str, token: &str) -> anyhow::Result<()> {
        (**self).delete(user_id, token).await
    }

    async fn delete_expired(&self, now: SystemTime) -> anyhow::Result<usize> {
        (**self).delete_expired(now).await
    }
}

/// Manager for bypass token operations.
///
/// Wraps a [`BypassTokenStore`] with the issuance and failure policy: never
/// let a token problem break the surrounding login or logout flow.
pub struct BypassTokenManager<S: BypassTokenStore> {
    store: S,
    generator: RandomStringGenerator,
}

impl<S: BypassTokenStore> BypassTokenManager<S> {
    /// Create a manager over `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            generator: RandomStringGenerator::new(),
        }
    }

    /// Issue a fresh token for `user_id`, valid for `lifetime_seconds`.
    ///
    /// Retries with a new token on insert conflict, up to
    /// [`MAX_ISSUE_ATTEMPTS`] times. Returns `None` once attempts are
    /// exhausted; the caller proceeds without a remember-device cookie.
    pub async fn issue(&self, user_id: &str, lifetime_seconds: u64) -> Option<String> {
        let expires_at = SystemTime::now() + Duration::from_secs(lifetime_seconds);

        for attempt in 0..MAX_ISSUE_ATTEMPTS {
            let record = BypassToken {
                token: self.generator.generate(TOKEN_LENGTH),
                user_id: user_id.to_string(),
                expires_at,
            };

            match self.store.insert(&record).await {
                Ok(()) => {
                    tracing::info!(
                        target: "twofa.token.issued",
                        user = %user_id,
                        lifetime_seconds,
                        "Issued bypass token"
                    );
                    return Some(record.token);
                }
                Err(e) => {
                    tracing::debug!(
                        target: "twofa.token.conflict",
                        user = %user_id,
                        attempt,
                        error = %e,
                        "Bypass token insert failed, regenerating"
                    );
                }
            }
        }

        tracing::warn!(
            target: "twofa.token.exhausted",
            user = %user_id,
            attempts = MAX_ISSUE_ATTEMPTS,
            "Could not issue bypass token, skipping"
        );
        None
    }

    /// Whether `token` is a live credential for `user_id`.
    ///
    /// Fails closed: a store error is reported as invalid, never propagated.
    pub async fn is_valid(&self, user_id: &str, token: &str) -> bool {
        match self
            .store
            .contains_valid(user_id, token, SystemTime::now())
            .await
        {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(
                    target: "twofa.token.store_error",
                    user = %user_id,
                    error = %e,
                    "Bypass token lookup failed, treating as invalid"
                );
                false
            }
        }
    }

    /// Delete the token presented at logout.
    ///
    /// A store error is logged and swallowed; logout must not fail because
    /// the token row could not be removed.
    pub async fn revoke(&self, user_id: &str, token: &str) {
        match self.store.delete(user_id, token).await {
            Ok(()) => {
                tracing::debug!(
                    target: "twofa.token.revoked",
                    user = %user_id,
                    "Revoked bypass token"
                );
            }
            Err(e) => {
                tracing::warn!(
                    target: "twofa.token.store_error",
                    user = %user_id,
                    error = %e,
                    "Bypass token revocation failed, continuing logout"
                );
            }
        }
    }

    /// Delete every expired token, returning how many were removed.
    ///
    /// Invoked opportunistically (when a challenge is about to be shown),
    /// never on a timer. A store error is logged and reported as zero.
    pub async fn sweep_expired(&self) -> usize {
        match self.store.delete_expired(SystemTime::now()).await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(
                        target: "twofa.token.swept",
                        count,
                        "Removed expired bypass tokens"
                    );
                }
                count
            }
            Err(e) => {
                tracing::warn!(
                    target: "twofa.token.store_error",
                    error = %e,
                    "Bypass token sweep failed"
                );
                0
            }
        }
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Bypass token store keeping rows in process memory, for tests and dev.
#[derive(Default)]
pub struct InMemoryBypassTokenStore {
    rows: RwLock<HashMap<String, BypassToken>>,
}

impl InMemoryBypassTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held, for inspection in tests.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl BypassTokenStore for InMemoryBypassTokenStore {
    async fn insert(&self, record: &BypassToken) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.token) {
            anyhow::bail!("duplicate token");
        }
        rows.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn contains_valid(
        &self,
        user_id: &str,
        token: &str,
        now: SystemTime,
    ) -> anyhow::Result<bool> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(token)
            .is_some_and(|row| row.user_id == user_id && !row.is_expired_at(now)))
    }

    async fn delete(&self, user_id: &str, token: &str) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        if rows.get(token).is_some_and(|row| row.user_id == user_id) {
            rows.remove(token);
        }
        Ok(())
    }

    async fn delete_expired(&self, now: SystemTime) -> anyhow::Result<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| !row.is_expired_at(now));
        Ok(before - rows.len())
    }
}
