//! In-memory adapters.
//!
//! Used by the test suites and by `onboarding-api` when no database URL is
//! configured.

mod billing;
mod clock;
mod identity;
mod message_channel;
mod signups;
mod store;
mod tenants;
#[cfg(test)]
pub(crate) mod test_support;
mod webhooks;

pub use clock::ManualClock;
pub use identity::InMemoryIdentityProvider;
pub use message_channel::{RecordingMessageChannel, SentMessage};
pub use store::{InMemoryStore, StoreOperation};
