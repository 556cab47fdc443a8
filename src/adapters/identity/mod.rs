//! Identity provider adapters.
//!
//! - `zitadel` - Production Zitadel user management implementation
//!
//! The in-memory provider used by tests lives in `adapters::memory`.

mod zitadel;

pub use zitadel::{ZitadelConfig, ZitadelIdentityProvider};
