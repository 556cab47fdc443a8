//! Message channel adapters for verification codes.
//!
//! - `twilio` - SMS through Twilio's Messages API
//! - `resend` - Email through Resend
//! - `routing` - Picks SMS or email from the contact address

mod resend;
mod routing;
mod twilio;

pub use resend::{ResendConfig, ResendEmailChannel};
pub use routing::AddressRoutingChannel;
pub use twilio::{TwilioConfig, TwilioSmsChannel};
