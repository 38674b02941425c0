//! Request-level orchestration of the two-factor check.
//!
//! The [`Authenticator`] is built once per request from narrow injected
//! collaborators (identity, request input, session storage, token storage,
//! event sink) and answers "is this request two-factor authenticated". It
//! owns the ordering: skip rules first, then code extraction, then
//! verification, then the side effects of a pass.
//!
//! # Example
//!
//! ```rust,ignore
//! use twostep::{Authenticator, TwoFactorConfigBuilder};
//!
//! let config = TwoFactorConfigBuilder::new().build()?;
//! let mut auth = Authenticator::new(config, identity, request, session, tokens, sink);
//!
//! if auth.has_valid_cookie_token().await {
//!     // trusted device, skip the challenge
//! } else if auth.is_authenticated().await? {
//!     if let Some(cookie) = auth.issued_cookie() {
//!         // set the remember-device cookie on the response
//!     }
//! } else {
//!     auth.sweep_expired_tokens().await;
//!     // render the challenge
//! }
//! ```

use crate::config::TwoFactorConfig;
use crate::error::{Result, TwostepError};
use crate::events::{AuthEvent, EventSink};
use crate::otp::OtpVerifier;
use crate::session::{SessionPolicy, SessionState, SessionStore};
use crate::token::{BypassTokenManager, BypassTokenStore};

/// The authenticated identity the application resolved for this request,
/// together with its enrollment state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    /// Opaque user identifier, used to key tokens and events.
    pub id: String,

    /// Base32 TOTP secret, `None` while the user has not enrolled.
    pub otp_secret: Option<String>,
}

impl Principal {
    /// Create a principal with no secret enrolled.
    #[must_use]
    pub fn unenrolled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            otp_secret: None,
        }
    }

    /// Create a principal with an enrolled secret.
    #[must_use]
    pub fn enrolled(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            otp_secret: Some(secret.into()),
        }
    }
}

/// Identity lookup for the current request.
pub trait IdentityProvider: Send + Sync {
    /// The authenticated principal, if any.
    fn current_user(&self) -> Option<Principal>;
}

/// Read access to the current request's input fields and cookies.
pub trait RequestReader: Send + Sync {
    /// Value of a form/body field.
    fn input(&self, name: &str) -> Option<String>;

    /// Whether a form/body field is present at all.
    fn has_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }

    /// Value of a request cookie.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Tri-state outcome of an OTP check.
///
/// Distinct from a boolean because "no code submitted" renders differently
/// from "wrong code".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpStatus {
    /// No code (or only whitespace) was submitted.
    Empty,
    /// The code verified against the user's secret.
    Valid,
    /// A code was submitted but did not verify.
    Invalid,
}

/// Response-cookie instruction produced when a bypass token was issued.
///
/// The crate never touches cookie transport; the surrounding collaborator
/// applies this to its response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieInstruction {
    /// Cookie name, from configuration.
    pub name: String,
    /// The bypass token.
    pub value: String,
    /// Cookie max-age in minutes.
    pub max_age_minutes: u64,
}

/// Per-request two-factor decision engine.
///
/// Generic over its injected collaborators so applications wire in their
/// own framework types; the bundled in-memory stores cover tests and dev.
pub struct Authenticator<I, R, S, T, E>
where
    I: IdentityProvider,
    R: RequestReader,
    S: SessionStore,
    T: BypassTokenStore,
    E: EventSink + Clone,
{
    identity: I,
    request: R,
    policy: SessionPolicy<S, E>,
    tokens: BypassTokenManager<T>,
    verifier: OtpVerifier,
    events: E,
    config: TwoFactorConfig,
    stateless: bool,
    issued_cookie: Option<CookieInstruction>,
}

impl<I, R, S, T, E> Authenticator<I, R, S, T, E>
where
    I: IdentityProvider,
    R: RequestReader,
    S: SessionStore,
    T: BypassTokenStore,
    E: EventSink + Clone,
{
    /// Create a stateful authenticator for one request.
    pub fn new(
        config: TwoFactorConfig,
        identity: I,
        request: R,
        session: S,
        tokens: T,
        events: E,
    ) -> Self {
        let policy = SessionPolicy::new(session, events.clone(), &config);
        let verifier = OtpVerifier::from_config(&config);
        Self {
            identity,
            request,
            policy,
            tokens: BypassTokenManager::new(tokens),
            verifier,
            events,
            config,
            stateless: false,
            issued_cookie: None,
        }
    }

    /// Whether this request counts as two-factor authenticated.
    ///
    /// Skippable requests (feature off, no principal, not enrolled, prior
    /// pass still fresh) are authenticated with no side effects beyond the
    /// keep-alive refresh. Otherwise the submitted code is verified and, on
    /// success, the pass is recorded and a bypass token issued when
    /// configured.
    pub async fn is_authenticated(&mut self) -> Result<bool> {
        if self.can_skip_check().await? {
            return Ok(true);
        }

        match self.check_otp().await? {
            OtpStatus::Valid => {
                self.login().await?;
                Ok(true)
            }
            OtpStatus::Empty | OtpStatus::Invalid => Ok(false),
        }
    }

    /// Whether the check can be skipped for this request.
    ///
    /// True when the feature is disabled, no principal is authenticated,
    /// the principal has no secret enrolled, or a prior pass is still
    /// fresh. An expired pass has already logged the session out by the
    /// time this returns false.
    pub async fn can_skip_check(&self) -> Result<bool> {
        if !self.config.enabled {
            return Ok(true);
        }

        let Some(user) = self.identity.current_user() else {
            return Ok(true);
        };

        if user.otp_secret.is_none() {
            tracing::debug!(
                target: "twofa.auth.unenrolled",
                user = %user.id,
                "No secret enrolled, skipping check"
            );
            return Ok(true);
        }

        let state = self.policy.evaluate(&user.id).await?;
        Ok(state == SessionState::PassedAndFresh)
    }

    /// Verify the code submitted with this request.
    ///
    /// Emits [`AuthEvent::EmptyOneTimePasswordReceived`] when no code was
    /// submitted (and fails instead when `throw_exceptions` is on) and
    /// [`AuthEvent::LoginFailed`] on a wrong code. On success the matched
    /// time-step is stored as the replay guard; recording the pass itself
    /// is [`login`](Self::login)'s job.
    pub async fn check_otp(&mut self) -> Result<OtpStatus> {
        let code = self
            .request
            .input(&self.config.otp_input)
            .map(|raw| raw.trim().to_string())
            .filter(|code| !code.is_empty());

        let Some(code) = code else {
            tracing::debug!(target: "twofa.auth.empty_otp", "No one-time password submitted");
            self.events.notify(AuthEvent::EmptyOneTimePasswordReceived);
            if self.config.throw_exceptions {
                return Err(TwostepError::invalid_one_time_password(
                    "no one-time password submitted",
                ));
            }
            return Ok(OtpStatus::Empty);
        };

        let Some(user) = self.identity.current_user() else {
            return Ok(OtpStatus::Invalid);
        };
        let secret = enrolled_secret(&user)?;

        let previous = self.policy.replay_guard().await?;
        match self
            .verifier
            .verify(&secret, &code, self.config.window, previous)?
        {
            Some(step) => {
                self.policy.record_replay_guard(step).await?;
                Ok(OtpStatus::Valid)
            }
            None => {
                tracing::info!(
                    target: "twofa.auth.failed",
                    user = %user.id,
                    "One-time password rejected"
                );
                self.events.notify(AuthEvent::LoginFailed {
                    user: user.id.clone(),
                });
                Ok(OtpStatus::Invalid)
            }
        }
    }

    /// Record a pass for the current principal.
    ///
    /// Marks the session, emits [`AuthEvent::LoginSucceeded`], and issues a
    /// bypass token when `store_in_cookie` is on, returning the cookie
    /// instruction for the response. Public so enrollment flows can mark a
    /// session passed after verifying the very first code.
    pub async fn login(&mut self) -> Result<Option<CookieInstruction>> {
        let Some(user) = self.identity.current_user() else {
            return Err(anyhow::anyhow!("login requires an authenticated principal").into());
        };

        self.policy.record_pass().await?;
        tracing::info!(
            target: "twofa.auth.passed",
            user = %user.id,
            "One-time password accepted"
        );
        self.events.notify(AuthEvent::LoginSucceeded {
            user: user.id.clone(),
        });

        if self.stateless || !self.config.store_in_cookie {
            return Ok(None);
        }

        let instruction = self
            .tokens
            .issue(&user.id, self.config.cookie_lifetime_seconds)
            .await
            .map(|token| CookieInstruction {
                name: self.config.cookie_name.clone(),
                value: token,
                max_age_minutes: self.config.cookie_lifetime_seconds / 60,
            });
        self.issued_cookie = instruction.clone();
        Ok(instruction)
    }

    /// Clear the session facts and revoke the presented bypass token.
    ///
    /// Token revocation failure never fails the logout.
    pub async fn logout(&mut self) -> Result<()> {
        let user = self.identity.current_user();

        if !self.stateless && self.config.store_in_cookie {
            if let (Some(user), Some(token)) =
                (&user, self.request.cookie(&self.config.cookie_name))
            {
                self.tokens.revoke(&user.id, &token).await;
            }
        }

        self.policy
            .logout(user.as_ref().map(|u| u.id.as_str()))
            .await
    }

    /// Whether the request presents a live bypass token for the current
    /// principal.
    ///
    /// A valid token authenticates the request without touching the session
    /// facts; the surrounding collaborator reissues the cookie. False when
    /// the feature is off, no principal is present, the cookie is absent,
    /// or the store cannot answer (fail closed).
    pub async fn has_valid_cookie_token(&self) -> bool {
        if self.stateless || !self.config.enabled || !self.config.store_in_cookie {
            return false;
        }

        let Some(user) = self.identity.current_user() else {
            return false;
        };
        let Some(token) = self.request.cookie(&self.config.cookie_name) else {
            return false;
        };

        let valid = self.tokens.is_valid(&user.id, &token).await;
        if valid {
            tracing::debug!(
                target: "twofa.auth.cookie_bypass",
                user = %user.id,
                "Valid bypass token presented, skipping challenge"
            );
        }
        valid
    }

    /// Opportunistically remove expired bypass tokens.
    ///
    /// Intended to run when a challenge is about to be shown. No-op unless
    /// the cookie feature is on.
    pub async fn sweep_expired_tokens(&self) -> usize {
        if self.stateless || !self.config.store_in_cookie {
            return 0;
        }
        self.tokens.sweep_expired().await
    }

    /// The response-cookie instruction produced by the most recent
    /// successful login, if any.
    #[must_use]
    pub fn issued_cookie(&self) -> Option<&CookieInstruction> {
        self.issued_cookie.as_ref()
    }

    /// The configuration this authenticator runs under.
    #[must_use]
    pub fn config(&self) -> &TwoFactorConfig {
        &self.config
    }
}

impl<I, R, E> Authenticator<I, R, (), (), E>
where
    I: IdentityProvider,
    R: RequestReader,
    E: EventSink + Clone,
{
    /// Create a stateless authenticator for one request.
    ///
    /// Identical verification logic, but session facts are never read or
    /// written and bypass tokens are never issued or honored; every request
    /// must carry a fresh valid code. For API clients without cookie state.
    pub fn stateless(config: TwoFactorConfig, identity: I, request: R, events: E) -> Self {
        let mut auth = Self::new(config, identity, request, (), (), events);
        auth.stateless = true;
        auth
    }
}

/// The secret of an enrolled principal.
///
/// A present-but-empty secret is a misconfiguration, not an unenrolled
/// user.
fn enrolled_secret(user: &Principal) -> Result<String> {
    match user.otp_secret.as_deref().map(str::trim) {
        Some(secret) if !secret.is_empty() => Ok(secret.to_string()),
        _ => Err(TwostepError::invalid_secret_key(format!(
            "user {} has no usable secret",
            user.id
        ))),
    }
}

/// Stateless flows have no token store; issuance is disabled before any of
/// these can be reached.
#[async_trait::async_trait]
impl BypassTokenStore for () {
    async fn insert(&self, _record: &crate::token::BypassToken) -> anyhow::Result<()> {
        anyhow::bail!("no token store configured")
    }

    async fn contains_valid(
        &self,
        _user_id: &str,
        _token: &str,
        _now: std::time::SystemTime,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn delete(&self, _user_id: &str, _token: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete_expired(&self, _now: std::time::SystemTime) -> anyhow::Result<usize> {
        Ok(0)
    }
}
