//! Signup handlers.
//!
//! ## Commands
//! - Creating a signup request and delivering its code
//! - Verifying a submitted code
//! - Resending a fresh code

mod create_signup;
mod resend_code;
mod verify_code;

pub use create_signup::{CreateSignupCommand, CreateSignupHandler, CreateSignupResult};
pub use resend_code::{ResendCodeCommand, ResendCodeHandler, ResendCodeResult};
pub use verify_code::{VerifyCodeCommand, VerifyCodeHandler, VerifyCodeResult};
