//! HTTP adapters - REST API implementations.

pub mod onboarding;

pub use onboarding::{onboarding_router, OnboardingAppState, OnboardingSettings};
