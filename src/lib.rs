//! Twostep - TOTP second-factor session guard
//!
//! Twostep decides when a web session counts as two-factor authenticated:
//! it verifies submitted one-time passwords with replay protection, tracks
//! how long a pass stays fresh, issues remember-device bypass tokens, and
//! generates recovery codes. Transport (routing, cookies, session backends,
//! databases) stays with the application, injected through narrow traits.
//!
//! # Features
//!
//! - **Verification**: windowed TOTP checks with the matched time-step
//!   reported back for replay guarding
//! - **Session policy**: sliding or fixed pass lifetime with automatic
//!   logout on expiry
//! - **Bypass tokens**: "remember this device" credentials with bounded
//!   retry on uniqueness conflicts and fail-closed validation
//! - **Recovery codes**: configurable grouped random codes for account
//!   recovery fallback
//! - **Events**: every security-relevant transition reported to an injected
//!   observer
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use twostep::{Authenticator, TwoFactorConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> twostep::Result<()> {
//!     twostep::init_tracing();
//!
//!     let config = TwoFactorConfigBuilder::new()
//!         .with_lifetime_minutes(30)
//!         .with_store_in_cookie(true)
//!         .build()?;
//!
//!     let mut auth = Authenticator::new(config, identity, request, session, tokens, sink);
//!
//!     if auth.has_valid_cookie_token().await || auth.is_authenticated().await? {
//!         // proceed; apply auth.issued_cookie() to the response if present
//!     } else {
//!         auth.sweep_expired_tokens().await;
//!         // render the OTP challenge
//!     }
//!     Ok(())
//! }
//! ```

mod authenticator;
mod config;
mod error;
mod events;
mod otp;
pub mod recovery;
pub mod session;
mod token;

// Re-exports for public API
pub use authenticator::{
    Authenticator, CookieInstruction, IdentityProvider, OtpStatus, Principal, RequestReader,
};
pub use config::{MAX_COOKIE_LIFETIME_SECS, TwoFactorConfig, TwoFactorConfigBuilder};
pub use error::{Result, TwostepError};
pub use events::{AuthEvent, EventSink};
pub use otp::OtpVerifier;
pub use recovery::{CharacterSet, LetterCase, RandomStringGenerator, RecoveryCodeSet};
pub use session::{InMemorySessionStore, SessionFacts, SessionPolicy, SessionState, SessionStore};
pub use token::{
    BypassToken, BypassTokenManager, BypassTokenStore, InMemoryBypassTokenStore,
    MAX_ISSUE_ATTEMPTS, TOKEN_LENGTH,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main().
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "twostep=debug")
/// - `TWOSTEP_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("TWOSTEP_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
