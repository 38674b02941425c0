//! Authentication lifecycle notifications.
//!
//! Every security-relevant transition in the two-factor flow is reported to
//! an injected [`EventSink`] so the application can audit, alert, or fan the
//! event out to its own bus. The crate never dispatches events globally.
//!
//! # Example
//!
//! ```rust,ignore
//! use twostep::{AuthEvent, EventSink};
//!
//! struct AuditLog;
//!
//! impl EventSink for AuditLog {
//!     fn notify(&self, event: AuthEvent) {
//!         tracing::info!(?event, "two-factor event");
//!     }
//! }
//! ```

use std::sync::Arc;

/// A security-relevant transition in the two-factor flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    /// A request reached the OTP check without any code submitted.
    EmptyOneTimePasswordReceived,

    /// A previously passed check aged past its configured lifetime.
    /// Always followed by [`AuthEvent::LoggedOut`], since expiry clears the
    /// session facts.
    OneTimePasswordExpired { user: String },

    /// A submitted code verified successfully and the session was marked
    /// as passed.
    LoginSucceeded { user: String },

    /// A submitted code failed verification.
    LoginFailed { user: String },

    /// The session facts were cleared, either explicitly or through expiry.
    /// `user` is `None` when no principal was resolvable at logout time.
    LoggedOut { user: Option<String> },
}

/// Observer interface for [`AuthEvent`]s.
///
/// Implementations must be cheap and non-blocking; sinks are called inline
/// from the authentication path.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: AuthEvent);
}

/// No-op implementation for when no sink is configured.
impl EventSink for () {
    fn notify(&self, _event: AuthEvent) {}
}

/// Allows one sink to be shared between collaborators.
impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn notify(&self, event: AuthEvent) {
        (**self).notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuthEvent>>,
    }

    impl EventSink for RecordingSink {
        fn notify(&self, event: AuthEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_noop_sink() {
        // The unit sink accepts events without side effects.
        ().notify(AuthEvent::EmptyOneTimePasswordReceived);
    }

    #[test]
    fn test_recording_sink_captures_events() {
        let sink = RecordingSink::default();
        sink.notify(AuthEvent::LoginSucceeded {
            user: "user-1".to_string(),
        });
        sink.notify(AuthEvent::LoggedOut { user: None });

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            AuthEvent::LoginSucceeded {
                user: "user-1".to_string()
            }
        );
    }

    #[test]
    fn test_arc_sink_forwards() {
        let sink = Arc::new(RecordingSink::default());
        let shared = Arc::clone(&sink);

        shared.notify(AuthEvent::LoginFailed {
            user: "user-1".to_string(),
        });

        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }
}
