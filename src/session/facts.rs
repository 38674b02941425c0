//! Session-scoped authentication facts.

use serde::{Deserialize, Serialize};

/// Session key holding the "two-factor check passed" flag.
pub const AUTH_PASSED_KEY: &str = "auth_passed";

/// Session key holding the unix timestamp of the last pass or refresh.
pub const AUTH_TIME_KEY: &str = "auth_time";

/// Session key holding the time-step of the last accepted code.
pub const OTP_TIMESTAMP_KEY: &str = "otp_timestamp";

/// Snapshot of the per-session authentication state.
///
/// Owned exclusively by one session: created on the first successful check,
/// refreshed while fresh, cleared on logout or expiry. The fields mirror the
/// three string-valued keys kept in the session store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFacts {
    /// Whether a one-time password check has passed in this session.
    pub auth_passed: bool,

    /// Unix seconds of the last pass (or keep-alive refresh).
    pub auth_time: Option<u64>,

    /// Time-step of the last accepted code, kept only while replay
    /// protection is active.
    pub otp_timestamp: Option<u64>,
}

impl SessionFacts {
    /// True when no check has passed and nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.auth_passed && self.auth_time.is_none() && self.otp_timestamp.is_none()
    }
}
