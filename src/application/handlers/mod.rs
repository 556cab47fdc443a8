//! Application handlers.
//!
//! One command handler per pipeline operation. Handlers receive their ports
//! as `Arc<dyn Port>` and hold no state between calls.

pub mod billing;
pub mod provisioning;
pub mod signup;

pub use billing::{
    CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler, CreateCheckoutResult,
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
pub use provisioning::{
    ProvisionAccountCommand, ProvisionAccountHandler, ProvisionAccountResult,
    RepairTenantsCommand, RepairTenantsHandler, RepairTenantsResult, TenantEnricher,
};
pub use signup::{
    CreateSignupCommand, CreateSignupHandler, CreateSignupResult, ResendCodeCommand,
    ResendCodeHandler, ResendCodeResult, VerifyCodeCommand, VerifyCodeHandler, VerifyCodeResult,
};
