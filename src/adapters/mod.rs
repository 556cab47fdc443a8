//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - sqlx repositories for every storage port
//! - `stripe` - Stripe REST payment provider and a mock for tests
//! - `messaging` - Twilio SMS and Resend email verification channels
//! - `identity` - Zitadel user management
//! - `memory` - In-memory storage, identity, messaging and clock
//! - `http` - Axum router, DTOs and error mapping

pub mod http;
pub mod identity;
pub mod memory;
pub mod messaging;
pub mod postgres;
pub mod stripe;
