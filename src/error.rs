/// The main error type for twostep operations
#[derive(Debug, thiserror::Error)]
pub enum TwostepError {
    /// The stored secret for an enrolled user is missing, malformed, or too
    /// short to build a TOTP from. This is a configuration fault, not a bad
    /// submission, and is never retried.
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// The submitted one-time password was rejected. Only raised when the
    /// configuration asks for empty submissions to fail hard; a merely wrong
    /// code is a negative verdict, not an error.
    #[error("Invalid one-time password: {0}")]
    InvalidOneTimePassword(String),

    /// Startup-time validation of the configuration value object failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session collaborator failed. Session access is request-local, so
    /// this indicates a wiring or backend fault rather than user input.
    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl TwostepError {
    pub fn invalid_secret_key(msg: impl Into<String>) -> Self {
        Self::InvalidSecretKey(msg.into())
    }

    pub fn invalid_one_time_password(msg: impl Into<String>) -> Self {
        Self::InvalidOneTimePassword(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn session_store(msg: impl Into<String>) -> Self {
        Self::SessionStore(msg.into())
    }
}

/// Result type alias for twostep operations
pub type Result<T> = std::result::Result<T, TwostepError>;

// Common error type conversions

impl From<serde_json::Error> for TwostepError {
    fn from(err: serde_json::Error) -> Self {
        TwostepError::Serialization(err.to_string())
    }
}
