//! Signup module - the verification ledger.
//!
//! Holds ephemeral signup requests and the one-time codes that prove a
//! person controls the contact address they gave.

mod code;
mod errors;
mod request;
mod state;

pub use code::{VerificationCode, CODE_LENGTH};
pub use errors::SignupError;
pub use request::{SignupFields, SignupPolicy, SignupRequest};
pub use state::SignupState;
