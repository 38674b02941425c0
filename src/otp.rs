//! One-time password verification.
//!
//! Wraps the TOTP primitive with the crate's acceptance policy: a submitted
//! code is checked against every time-step inside the configured clock-skew
//! window, and the step that matched is reported back so the caller can
//! persist it as a replay guard.
//!
//! # Example
//!
//! ```rust,ignore
//! use twostep::OtpVerifier;
//!
//! let verifier = OtpVerifier::new();
//!
//! // `Some(step)` on success; persist `step` to reject replays.
//! if let Some(step) = verifier.verify(&secret, &code, 1, previous)? {
//!     replay_guard.store(step);
//! }
//! ```

use crate::config::TwoFactorConfig;
use crate::error::{Result, TwostepError};
use totp_rs::{Algorithm, Secret, TOTP};

/// Verifies submitted one-time passwords against a shared secret.
///
/// Holds only the shape of the TOTP primitive (digits, step length,
/// algorithm); the acceptance window and replay guard are per-call inputs
/// because they are request-scoped policy.
#[derive(Clone, Debug)]
pub struct OtpVerifier {
    digits: usize,
    step_seconds: u64,
    algorithm: Algorithm,
}

impl Default for OtpVerifier {
    fn default() -> Self {
        Self {
            digits: 6,
            step_seconds: 30,
            // SHA-1 for authenticator app compatibility
            algorithm: Algorithm::SHA1,
        }
    }
}

impl OtpVerifier {
    /// Create a verifier with the standard 6-digit, 30-second shape.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verifier matching the configured primitive shape.
    #[must_use]
    pub fn from_config(config: &TwoFactorConfig) -> Self {
        Self {
            digits: config.digits,
            step_seconds: config.step_seconds,
            algorithm: Algorithm::SHA1,
        }
    }

    /// Set the number of digits.
    #[must_use]
    pub fn digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    /// Set the time-step length in seconds.
    #[must_use]
    pub fn step_seconds(mut self, seconds: u64) -> Self {
        self.step_seconds = seconds;
        self
    }

    /// Verify a submitted code against a stored secret.
    ///
    /// Checks `window` time-steps on either side of the current one. Returns
    /// `Some(matched_step)` when the code matches and is newer than
    /// `previous` (the last accepted step, if replay protection is active),
    /// `Ok(None)` for a wrong, reused, or out-of-window code. `Err` is
    /// reserved for an unusable secret.
    pub fn verify(
        &self,
        secret: &str,
        code: &str,
        window: u64,
        previous: Option<u64>,
    ) -> Result<Option<u64>> {
        let now = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs(),
            Err(e) => {
                tracing::warn!(error = %e, "System clock is before the Unix epoch");
                return Ok(None);
            }
        };
        self.verify_at(secret, code, window, previous, now)
    }

    /// Verify with a specific timestamp (useful for testing).
    pub fn verify_at(
        &self,
        secret: &str,
        code: &str,
        window: u64,
        previous: Option<u64>,
        now: u64,
    ) -> Result<Option<u64>> {
        let totp = self.build_totp(secret)?;

        // Clean the code (remove spaces, dashes)
        let code = code.trim().replace([' ', '-'], "");
        if code.is_empty() {
            return Ok(None);
        }

        let current_step = now / self.step_seconds;
        let first = current_step.saturating_sub(window);
        let last = current_step + window;

        let mut matched = None;
        for step in first..=last {
            let candidate = totp.generate(step * self.step_seconds);
            if constant_time_compare(&candidate, &code) {
                matched = Some(step);
                break;
            }
        }

        let Some(step) = matched else {
            return Ok(None);
        };

        if let Some(previous) = previous {
            if step <= previous {
                tracing::debug!(
                    target: "twofa.otp.replayed",
                    step,
                    previous,
                    "Rejected code from an already used time-step"
                );
                return Ok(None);
            }
        }

        Ok(Some(step))
    }

    fn build_totp(&self, secret: &str) -> Result<TOTP> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| TwostepError::invalid_secret_key(format!("{:?}", e)))?;

        TOTP::new(self.algorithm, self.digits, 0, self.step_seconds, secret_bytes)
            .map_err(|e| TwostepError::invalid_secret_key(e.to_string()))
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
