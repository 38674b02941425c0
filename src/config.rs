use serde::{Deserialize, Serialize};

use crate::error::{Result, TwostepError};

/// Longest allowed remember-device cookie lifetime in seconds (93 days).
///
/// Values above this are clamped at build time with a warning; browsers and
/// the token table both treat anything longer as effectively permanent.
pub const MAX_COOKIE_LIFETIME_SECS: u64 = 8_035_200;

/// Configuration for the two-factor flow.
///
/// Construct through [`TwoFactorConfigBuilder`], which validates the values
/// once at startup. Every policy decision in the crate reads from this
/// object; nothing is looked up lazily at request time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwoFactorConfig {
    /// Whether the two-factor check is enforced at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How long a passed check stays valid, in minutes. `0` means it never
    /// expires.
    #[serde(default)]
    pub lifetime_minutes: u64,

    /// Refresh the pass timestamp on every authenticated request, making the
    /// lifetime sliding rather than fixed.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: bool,

    /// Clock-skew tolerance in time-steps on either side of "now".
    #[serde(default = "default_window")]
    pub window: u64,

    /// Reject codes from time-steps at or before the last accepted one.
    #[serde(default)]
    pub forbid_old_passwords: bool,

    /// Name of the request field carrying the submitted code.
    #[serde(default = "default_otp_input")]
    pub otp_input: String,

    /// Issue a remember-device bypass token after a successful check.
    #[serde(default)]
    pub store_in_cookie: bool,

    /// Name of the cookie carrying the bypass token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Bypass token lifetime in seconds, capped at
    /// [`MAX_COOKIE_LIFETIME_SECS`].
    #[serde(default = "default_cookie_lifetime")]
    pub cookie_lifetime_seconds: u64,

    /// Fail with an error when the submitted code is empty, instead of
    /// reporting a negative verdict.
    #[serde(default = "default_throw_exceptions")]
    pub throw_exceptions: bool,

    /// Number of digits in a one-time password.
    #[serde(default = "default_digits")]
    pub digits: usize,

    /// Length of one TOTP time-step in seconds.
    #[serde(default = "default_step")]
    pub step_seconds: u64,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lifetime_minutes: 0,
            keep_alive: default_keep_alive(),
            window: default_window(),
            forbid_old_passwords: false,
            otp_input: default_otp_input(),
            store_in_cookie: false,
            cookie_name: default_cookie_name(),
            cookie_lifetime_seconds: default_cookie_lifetime(),
            throw_exceptions: default_throw_exceptions(),
            digits: default_digits(),
            step_seconds: default_step(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_keep_alive() -> bool {
    true
}

fn default_window() -> u64 {
    1
}

fn default_otp_input() -> String {
    "one_time_password".to_string()
}

fn default_cookie_name() -> String {
    "2fa_token".to_string()
}

fn default_cookie_lifetime() -> u64 {
    MAX_COOKIE_LIFETIME_SECS
}

fn default_throw_exceptions() -> bool {
    true
}

fn default_digits() -> usize {
    6
}

fn default_step() -> u64 {
    30
}

/// Builder for [`TwoFactorConfig`] with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct TwoFactorConfigBuilder {
    config: TwoFactorConfig,
}

impl TwoFactorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TwoFactorConfig::default(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the pass lifetime in minutes. `0` means never expire.
    pub fn with_lifetime_minutes(mut self, minutes: u64) -> Self {
        self.config.lifetime_minutes = minutes;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Set the clock-skew tolerance in time-steps.
    pub fn with_window(mut self, window: u64) -> Self {
        self.config.window = window;
        self
    }

    pub fn with_forbid_old_passwords(mut self, forbid: bool) -> Self {
        self.config.forbid_old_passwords = forbid;
        self
    }

    pub fn with_otp_input(mut self, name: impl Into<String>) -> Self {
        self.config.otp_input = name.into();
        self
    }

    pub fn with_store_in_cookie(mut self, store: bool) -> Self {
        self.config.store_in_cookie = store;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.config.cookie_name = name.into();
        self
    }

    /// Set the bypass token lifetime in seconds. Values above
    /// [`MAX_COOKIE_LIFETIME_SECS`] are clamped at build time.
    pub fn with_cookie_lifetime_seconds(mut self, seconds: u64) -> Self {
        self.config.cookie_lifetime_seconds = seconds;
        self
    }

    pub fn with_throw_exceptions(mut self, throw: bool) -> Self {
        self.config.throw_exceptions = throw;
        self
    }

    pub fn with_digits(mut self, digits: usize) -> Self {
        self.config.digits = digits;
        self
    }

    pub fn with_step_seconds(mut self, seconds: u64) -> Self {
        self.config.step_seconds = seconds;
        self
    }

    /// Load configuration from environment variables with TWOSTEP_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(enabled) = get_env_with_prefix("2FA_ENABLED") {
            self.config.enabled = enabled.parse().unwrap_or(self.config.enabled);
        }
        if let Some(lifetime) = get_env_with_prefix("2FA_LIFETIME_MINUTES") {
            if let Ok(minutes) = lifetime.parse() {
                self.config.lifetime_minutes = minutes;
            }
        }
        if let Some(keep_alive) = get_env_with_prefix("2FA_KEEP_ALIVE") {
            self.config.keep_alive = keep_alive.parse().unwrap_or(self.config.keep_alive);
        }
        if let Some(window) = get_env_with_prefix("2FA_WINDOW") {
            if let Ok(steps) = window.parse() {
                self.config.window = steps;
            }
        }
        if let Some(forbid) = get_env_with_prefix("2FA_FORBID_OLD_PASSWORDS") {
            self.config.forbid_old_passwords =
                forbid.parse().unwrap_or(self.config.forbid_old_passwords);
        }
        if let Some(input) = get_env_with_prefix("2FA_OTP_INPUT") {
            self.config.otp_input = input;
        }
        if let Some(store) = get_env_with_prefix("2FA_STORE_IN_COOKIE") {
            self.config.store_in_cookie = store.parse().unwrap_or(self.config.store_in_cookie);
        }
        if let Some(name) = get_env_with_prefix("2FA_COOKIE_NAME") {
            self.config.cookie_name = name;
        }
        if let Some(lifetime) = get_env_with_prefix("2FA_COOKIE_LIFETIME_SECONDS") {
            if let Ok(seconds) = lifetime.parse() {
                self.config.cookie_lifetime_seconds = seconds;
            }
        }
        if let Some(throw) = get_env_with_prefix("2FA_THROW_EXCEPTIONS") {
            self.config.throw_exceptions = throw.parse().unwrap_or(self.config.throw_exceptions);
        }
        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration is invalid:
    /// - Empty OTP input field name
    /// - Empty cookie name while `store_in_cookie` is on
    /// - Digits outside the 6..=8 range accepted by authenticator apps
    /// - Zero-length time-step
    pub fn build(mut self) -> Result<TwoFactorConfig> {
        if self.config.otp_input.trim().is_empty() {
            return Err(TwostepError::config("otp_input must not be empty"));
        }

        if self.config.store_in_cookie && self.config.cookie_name.trim().is_empty() {
            return Err(TwostepError::config(
                "cookie_name must not be empty when store_in_cookie is enabled",
            ));
        }

        if !(6..=8).contains(&self.config.digits) {
            return Err(TwostepError::config(format!(
                "digits must be between 6 and 8, got {}",
                self.config.digits
            )));
        }

        if self.config.step_seconds == 0 {
            return Err(TwostepError::config(
                "step_seconds must be greater than 0",
            ));
        }

        if self.config.cookie_lifetime_seconds > MAX_COOKIE_LIFETIME_SECS {
            tracing::warn!(
                target: "twofa.config.cookie_lifetime_clamped",
                configured = self.config.cookie_lifetime_seconds,
                cap = MAX_COOKIE_LIFETIME_SECS,
                "Bypass cookie lifetime exceeds the cap, clamping"
            );
            self.config.cookie_lifetime_seconds = MAX_COOKIE_LIFETIME_SECS;
        }

        Ok(self.config)
    }
}

impl Default for TwoFactorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Get environment variable with TWOSTEP_ prefix, falling back to the
/// unprefixed name.
fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("TWOSTEP_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}
