//! Onboarding pipeline - signup to paid tenant
//!
//! This crate verifies a new customer's contact address with a one-time code,
//! provisions their tenant (company, identity, profile, membership, billing
//! record), opens Stripe checkout sessions and reconciles Stripe webhooks
//! back into local billing state.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
