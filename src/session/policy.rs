//! Session freshness policy
//!
//! Decides whether a previously passed two-factor check still counts for the
//! current request. The decision is driven by the facts kept in the session
//! store and the configured lifetime; expiry is terminal for the stored
//! facts, so an expired pass logs the session out on the spot and the next
//! evaluation starts from [`SessionState::NoPriorPass`].
//!
//! # Tracing Events
//!
//! - `twofa.session.passed` - check passed, facts recorded
//! - `twofa.session.refreshed` - keep-alive pushed `auth_time` forward
//! - `twofa.session.expired` - pass aged out, session logged out
//! - `twofa.session.logged_out` - facts cleared

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::TwoFactorConfig;
use crate::error::Result;
use crate::events::{AuthEvent, EventSink};
use crate::session::facts::{AUTH_PASSED_KEY, AUTH_TIME_KEY, OTP_TIMESTAMP_KEY, SessionFacts};
use crate::session::store::SessionStore;

/// Outcome of evaluating the stored session facts against the lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No check has passed in this session.
    NoPriorPass,

    /// A check passed and is still within the configured lifetime.
    PassedAndFresh,

    /// A check had passed but aged out. The session has already been logged
    /// out by the time this is returned.
    PassedAndExpired,
}

/// Applies the freshness rules to one session.
///
/// Holds the session store together with the slice of configuration it needs,
/// so callers never re-read config at decision time.
pub struct SessionPolicy<S: SessionStore, E: EventSink> {
    store: S,
    events: E,
    lifetime_minutes: u64,
    keep_alive: bool,
    forbid_old_passwords: bool,
}

impl<S: SessionStore, E: EventSink> SessionPolicy<S, E> {
    /// Create a policy over `store`, reporting transitions to `events`.
    pub fn new(store: S, events: E, config: &TwoFactorConfig) -> Self {
        Self {
            store,
            events,
            lifetime_minutes: config.lifetime_minutes,
            keep_alive: config.keep_alive,
            forbid_old_passwords: config.forbid_old_passwords,
        }
    }

    /// Read the current facts out of the session store.
    ///
    /// Values that fail to parse are treated as absent rather than as
    /// errors; a session seeded with garbage must not grant access.
    pub async fn read_facts(&self) -> Result<SessionFacts> {
        let auth_passed = self.store.get(AUTH_PASSED_KEY).await?.as_deref() == Some("true");
        let auth_time = match self.store.get(AUTH_TIME_KEY).await? {
            Some(raw) => raw.parse().ok(),
            None => None,
        };
        let otp_timestamp = match self.store.get(OTP_TIMESTAMP_KEY).await? {
            Some(raw) => raw.parse().ok(),
            None => None,
        };

        Ok(SessionFacts {
            auth_passed,
            auth_time,
            otp_timestamp,
        })
    }

    /// Evaluate the stored facts against the lifetime as of now.
    ///
    /// When the pass has expired this emits
    /// [`AuthEvent::OneTimePasswordExpired`] and logs the session out before
    /// returning, so the caller only has to branch on the returned state.
    pub async fn evaluate(&self, user_id: &str) -> Result<SessionState> {
        self.evaluate_at(user_id, unix_now()).await
    }

    /// Evaluate the stored facts as of `now` in unix seconds (useful for
    /// testing).
    pub async fn evaluate_at(&self, user_id: &str, now: u64) -> Result<SessionState> {
        let facts = self.read_facts().await?;

        if !facts.auth_passed {
            return Ok(SessionState::NoPriorPass);
        }

        if self.is_expired(&facts, now) {
            tracing::info!(
                target: "twofa.session.expired",
                user = %user_id,
                "Two-factor pass lifetime elapsed, logging out"
            );
            self.events.notify(AuthEvent::OneTimePasswordExpired {
                user: user_id.to_string(),
            });
            self.logout(Some(user_id)).await?;
            return Ok(SessionState::PassedAndExpired);
        }

        if self.keep_alive {
            self.store.put(AUTH_TIME_KEY, &now.to_string()).await?;
            tracing::debug!(target: "twofa.session.refreshed", "Keep-alive pushed auth_time forward");
        }

        Ok(SessionState::PassedAndFresh)
    }

    /// Mark the session as having passed a check right now.
    pub async fn record_pass(&self) -> Result<()> {
        self.store.put(AUTH_PASSED_KEY, "true").await?;
        self.store
            .put(AUTH_TIME_KEY, &unix_now().to_string())
            .await?;
        tracing::debug!(target: "twofa.session.passed", "Marked session as two-factor passed");
        Ok(())
    }

    /// Remember the time-step of an accepted code so it cannot be replayed.
    ///
    /// Does nothing unless `forbid_old_passwords` is enabled.
    pub async fn record_replay_guard(&self, step: u64) -> Result<()> {
        if !self.forbid_old_passwords {
            return Ok(());
        }
        self.store.put(OTP_TIMESTAMP_KEY, &step.to_string()).await
    }

    /// Time-step of the last accepted code, when replay protection is on.
    ///
    /// Always `None` while `forbid_old_passwords` is disabled, so codes from
    /// earlier steps inside the window remain acceptable.
    pub async fn replay_guard(&self) -> Result<Option<u64>> {
        if !self.forbid_old_passwords {
            return Ok(None);
        }
        match self.store.get(OTP_TIMESTAMP_KEY).await? {
            Some(raw) => Ok(raw.parse().ok()),
            None => Ok(None),
        }
    }

    /// Remove this crate's keys from the session, leaving everything else
    /// the application keeps there untouched.
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(AUTH_PASSED_KEY).await?;
        self.store.remove(AUTH_TIME_KEY).await?;
        self.store.remove(OTP_TIMESTAMP_KEY).await?;
        Ok(())
    }

    /// Clear the facts and announce the logout.
    pub async fn logout(&self, user_id: Option<&str>) -> Result<()> {
        self.clear().await?;
        tracing::info!(
            target: "twofa.session.logged_out",
            user = %user_id.unwrap_or("-"),
            "Cleared two-factor session state"
        );
        self.events.notify(AuthEvent::LoggedOut {
            user: user_id.map(str::to_string),
        });
        Ok(())
    }

    /// A pass is stale once `lifetime_minutes` have fully elapsed since
    /// `auth_time`. A lifetime of zero never expires; a passed flag without
    /// a readable timestamp cannot prove freshness and counts as expired.
    fn is_expired(&self, facts: &SessionFacts, now: u64) -> bool {
        if self.lifetime_minutes == 0 {
            return false;
        }
        match facts.auth_time {
            Some(auth_time) => now.saturating_sub(auth_time) >= self.lifetime_minutes * 60,
            None => true,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwoFactorConfigBuilder;
    use crate::session::in_memory::InMemorySessionStore;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuthEvent>>,
    }

    impl RecordingSink {
        fn recorded(&self) -> Vec<AuthEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn notify(&self, event: AuthEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn policy_with(
        config: &TwoFactorConfig,
    ) -> (
        SessionPolicy<InMemorySessionStore, Arc<RecordingSink>>,
        InMemorySessionStore,
        Arc<RecordingSink>,
    ) {
        let store = InMemorySessionStore::new();
        let sink = Arc::new(RecordingSink::default());
        let policy = SessionPolicy::new(store.clone(), Arc::clone(&sink), config);
        (policy, store, sink)
    }

    const NOW: u64 = 1_700_000_000;

    // ============ Evaluation tests ============

    #[tokio::test]
    async fn empty_session_has_no_prior_pass() {
        let config = TwoFactorConfigBuilder::new().build().unwrap();
        let (policy, _store, sink) = policy_with(&config);

        let state = policy.evaluate("user-1").await.unwrap();

        assert_eq!(state, SessionState::NoPriorPass);
        assert!(sink.recorded().is_empty());
    }

    #[tokio::test]
    async fn recorded_pass_is_fresh() {
        let config = TwoFactorConfigBuilder::new().build().unwrap();
        let (policy, _store, _sink) = policy_with(&config);

        policy.record_pass().await.unwrap();

        let state = policy.evaluate("user-1").await.unwrap();
        assert_eq!(state, SessionState::PassedAndFresh);
    }

    #[tokio::test]
    async fn zero_lifetime_never_expires() {
        let config = TwoFactorConfigBuilder::new()
            .with_lifetime_minutes(0)
            .build()
            .unwrap();
        let (policy, store, sink) = policy_with(&config);

        store.put(AUTH_PASSED_KEY, "true").await.unwrap();
        // A pass recorded a year ago.
        let year = 365 * 24 * 3600;
        store
            .put(AUTH_TIME_KEY, &(NOW - year).to_string())
            .await
            .unwrap();

        let state = policy.evaluate_at("user-1", NOW).await.unwrap();

        assert_eq!(state, SessionState::PassedAndFresh);
        assert!(sink.recorded().is_empty());
    }

    #[tokio::test]
    async fn pass_expires_once_lifetime_fully_elapses() {
        let config = TwoFactorConfigBuilder::new()
            .with_lifetime_minutes(5)
            .with_keep_alive(false)
            .build()
            .unwrap();
        let (policy, store, _sink) = policy_with(&config);

        store.put(AUTH_PASSED_KEY, "true").await.unwrap();
        store
            .put(AUTH_TIME_KEY, &(NOW - 299).to_string())
            .await
            .unwrap();
        assert_eq!(
            policy.evaluate_at("user-1", NOW).await.unwrap(),
            SessionState::PassedAndFresh
        );

        store
            .put(AUTH_TIME_KEY, &(NOW - 300).to_string())
            .await
            .unwrap();
        assert_eq!(
            policy.evaluate_at("user-1", NOW).await.unwrap(),
            SessionState::PassedAndExpired
        );
    }

    #[tokio::test]
    async fn expiry_logs_out_and_emits_both_events() {
        let config = TwoFactorConfigBuilder::new()
            .with_lifetime_minutes(5)
            .build()
            .unwrap();
        let (policy, store, sink) = policy_with(&config);

        store.put(AUTH_PASSED_KEY, "true").await.unwrap();
        store
            .put(AUTH_TIME_KEY, &(NOW - 600).to_string())
            .await
            .unwrap();

        let state = policy.evaluate_at("user-1", NOW).await.unwrap();

        assert_eq!(state, SessionState::PassedAndExpired);
        assert!(policy.read_facts().await.unwrap().is_empty());
        assert_eq!(
            sink.recorded(),
            vec![
                AuthEvent::OneTimePasswordExpired {
                    user: "user-1".to_string()
                },
                AuthEvent::LoggedOut {
                    user: Some("user-1".to_string())
                },
            ]
        );

        // The next evaluation starts over.
        assert_eq!(
            policy.evaluate_at("user-1", NOW).await.unwrap(),
            SessionState::NoPriorPass
        );
    }

    #[tokio::test]
    async fn passed_flag_without_timestamp_counts_as_expired() {
        let config = TwoFactorConfigBuilder::new()
            .with_lifetime_minutes(5)
            .build()
            .unwrap();
        let (policy, store, _sink) = policy_with(&config);

        store.put(AUTH_PASSED_KEY, "true").await.unwrap();

        assert_eq!(
            policy.evaluate_at("user-1", NOW).await.unwrap(),
            SessionState::PassedAndExpired
        );
    }

    #[tokio::test]
    async fn unparseable_timestamp_counts_as_expired() {
        let config = TwoFactorConfigBuilder::new()
            .with_lifetime_minutes(5)
            .build()
            .unwrap();
        let (policy, store, _sink) = policy_with(&config);

        store.put(AUTH_PASSED_KEY, "true").await.unwrap();
        store.put(AUTH_TIME_KEY, "not-a-number").await.unwrap();

        assert_eq!(
            policy.evaluate_at("user-1", NOW).await.unwrap(),
            SessionState::PassedAndExpired
        );
    }

    // ============ Keep-alive tests ============

    #[tokio::test]
    async fn keep_alive_refreshes_auth_time_on_fresh_pass() {
        let config = TwoFactorConfigBuilder::new()
            .with_lifetime_minutes(5)
            .with_keep_alive(true)
            .build()
            .unwrap();
        let (policy, store, _sink) = policy_with(&config);

        store.put(AUTH_PASSED_KEY, "true").await.unwrap();
        store
            .put(AUTH_TIME_KEY, &(NOW - 120).to_string())
            .await
            .unwrap();

        let state = policy.evaluate_at("user-1", NOW).await.unwrap();

        assert_eq!(state, SessionState::PassedAndFresh);
        let facts = policy.read_facts().await.unwrap();
        assert_eq!(facts.auth_time, Some(NOW));
    }

    #[tokio::test]
    async fn keep_alive_off_leaves_auth_time_alone() {
        let config = TwoFactorConfigBuilder::new()
            .with_lifetime_minutes(5)
            .with_keep_alive(false)
            .build()
            .unwrap();
        let (policy, store, _sink) = policy_with(&config);

        store.put(AUTH_PASSED_KEY, "true").await.unwrap();
        store
            .put(AUTH_TIME_KEY, &(NOW - 120).to_string())
            .await
            .unwrap();

        policy.evaluate_at("user-1", NOW).await.unwrap();

        let facts = policy.read_facts().await.unwrap();
        assert_eq!(facts.auth_time, Some(NOW - 120));
    }

    // ============ Replay guard tests ============

    #[tokio::test]
    async fn replay_guard_is_inert_unless_enabled() {
        let config = TwoFactorConfigBuilder::new()
            .with_forbid_old_passwords(false)
            .build()
            .unwrap();
        let (policy, store, _sink) = policy_with(&config);

        policy.record_replay_guard(56_666_666).await.unwrap();

        assert_eq!(policy.replay_guard().await.unwrap(), None);
        assert!(!store.snapshot().await.contains_key(OTP_TIMESTAMP_KEY));
    }

    #[tokio::test]
    async fn replay_guard_remembers_latest_step() {
        let config = TwoFactorConfigBuilder::new()
            .with_forbid_old_passwords(true)
            .build()
            .unwrap();
        let (policy, _store, _sink) = policy_with(&config);

        policy.record_replay_guard(56_666_666).await.unwrap();
        assert_eq!(policy.replay_guard().await.unwrap(), Some(56_666_666));

        policy.record_replay_guard(56_666_667).await.unwrap();
        assert_eq!(policy.replay_guard().await.unwrap(), Some(56_666_667));
    }

    // ============ Logout tests ============

    #[tokio::test]
    async fn logout_clears_facts_and_emits_event() {
        let config = TwoFactorConfigBuilder::new().build().unwrap();
        let (policy, _store, sink) = policy_with(&config);

        policy.record_pass().await.unwrap();
        policy.logout(Some("user-1")).await.unwrap();

        assert!(policy.read_facts().await.unwrap().is_empty());
        assert_eq!(
            sink.recorded(),
            vec![AuthEvent::LoggedOut {
                user: Some("user-1".to_string())
            }]
        );
    }

    #[tokio::test]
    async fn logout_leaves_unrelated_session_keys() {
        let config = TwoFactorConfigBuilder::new().build().unwrap();
        let (policy, store, _sink) = policy_with(&config);

        store.put("cart_id", "cart-42").await.unwrap();
        policy.record_pass().await.unwrap();

        policy.logout(None).await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.get("cart_id"), Some(&"cart-42".to_string()));
        assert!(!snapshot.contains_key(AUTH_PASSED_KEY));
        assert!(!snapshot.contains_key(AUTH_TIME_KEY));
    }

    // ============ Stateless store tests ============

    #[tokio::test]
    async fn unit_store_never_accumulates_a_pass() {
        let config = TwoFactorConfigBuilder::new().build().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let policy = SessionPolicy::new((), Arc::clone(&sink), &config);

        policy.record_pass().await.unwrap();

        assert_eq!(
            policy.evaluate("user-1").await.unwrap(),
            SessionState::NoPriorPass
        );
        assert!(sink.recorded().is_empty());
    }
}
