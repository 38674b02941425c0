//! Session state for the two-factor flow.
//!
//! The session is where a passed check lives between requests: the facts
//! recorded for it, the storage trait they travel through, and the policy
//! that decides when a pass has gone stale.

mod facts;
mod in_memory;
mod policy;
mod store;

pub use facts::{AUTH_PASSED_KEY, AUTH_TIME_KEY, OTP_TIMESTAMP_KEY, SessionFacts};
pub use in_memory::InMemorySessionStore;
pub use policy::{SessionPolicy, SessionState};
pub use store::SessionStore;
