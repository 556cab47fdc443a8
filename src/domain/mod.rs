//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `signup` - Verification ledger: signup requests and one-time codes
//! - `tenant` - Company, profile, membership and billing customer records
//! - `billing` - Checkout metadata, leads and Stripe webhook parsing

pub mod billing;
pub mod foundation;
pub mod signup;
pub mod tenant;
