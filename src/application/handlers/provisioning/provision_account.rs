//! ProvisionAccountHandler - turns a verified signup into a tenant.
//!
//! Core steps run in order and are undone by hand on failure, since the store
//! offers no transaction spanning them:
//!
//! 1. next account number
//! 2. company
//! 3. external identity, under an id derived from the signup
//! 4. user profile
//!
//! A unique violation on the company or profile means a concurrent attempt
//! for the same signup won; its tenant is fetched and returned.
//!
//! Membership and billing shell follow as enrichment (see [`TenantEnricher`]).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{DomainError, ErrorCode, SignupRequestId, UserId};
use crate::domain::signup::SignupRequest;
use crate::domain::tenant::{Company, ProvisioningError, TenantBundle, UserProfile};
use crate::ports::{Clock, IdentityProvider, NewIdentity, SignupRepository, TenantRepository};

use super::enrichment::TenantEnricher;

#[derive(Debug, Clone)]
pub struct ProvisionAccountCommand {
    pub signup_id: SignupRequestId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionAccountResult {
    pub bundle: TenantBundle,
    /// False when the tenant already existed and was fetched instead.
    pub created: bool,
}

enum Created {
    New(Company, UserProfile),
    /// Another attempt for the same signup got there first.
    Existing(TenantBundle),
}

/// Handler for account provisioning.
pub struct ProvisionAccountHandler {
    signups: Arc<dyn SignupRepository>,
    tenants: Arc<dyn TenantRepository>,
    identity: Arc<dyn IdentityProvider>,
    enricher: Arc<TenantEnricher>,
    clock: Arc<dyn Clock>,
    step_timeout: Duration,
}

impl ProvisionAccountHandler {
    pub fn new(
        signups: Arc<dyn SignupRepository>,
        tenants: Arc<dyn TenantRepository>,
        identity: Arc<dyn IdentityProvider>,
        enricher: Arc<TenantEnricher>,
        clock: Arc<dyn Clock>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            signups,
            tenants,
            identity,
            enricher,
            clock,
            step_timeout,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProvisionAccountCommand,
    ) -> Result<ProvisionAccountResult, ProvisioningError> {
        let signup = self
            .within("load signup", self.signups.find_by_id(&cmd.signup_id))
            .await?
            .ok_or(ProvisioningError::NotFound(cmd.signup_id))?;
        if !signup.is_verified() {
            return Err(ProvisioningError::NotVerified(cmd.signup_id));
        }

        if let Some(bundle) = self.existing_bundle(&signup).await? {
            tracing::info!(
                signup_id = %signup.id,
                company_id = %bundle.company.id,
                "tenant already provisioned"
            );
            return Ok(ProvisionAccountResult {
                bundle,
                created: false,
            });
        }

        let (company, profile) = match self.create_core(&signup).await? {
            Created::New(company, profile) => (company, profile),
            Created::Existing(bundle) => {
                return Ok(ProvisionAccountResult {
                    bundle,
                    created: false,
                })
            }
        };
        tracing::info!(
            signup_id = %signup.id,
            company_id = %company.id,
            user_id = %profile.id,
            account_number = %company.account_number,
            "tenant provisioned"
        );

        let bundle = self.enricher.enrich(company, profile).await;
        Ok(ProvisionAccountResult {
            bundle,
            created: true,
        })
    }

    /// Returns the tenant already linked to this signup, enriched.
    async fn existing_bundle(
        &self,
        signup: &SignupRequest,
    ) -> Result<Option<TenantBundle>, ProvisioningError> {
        let Some(profile) = self
            .within("load profile", self.tenants.find_profile_by_signup(&signup.id))
            .await?
        else {
            return Ok(None);
        };
        let company = self
            .within("load company", self.tenants.find_company(&profile.company_id))
            .await?
            .ok_or_else(|| {
                ProvisioningError::upstream(format!(
                    "profile {} points at missing company {}",
                    profile.id, profile.company_id
                ))
            })?;
        Ok(Some(self.enricher.enrich(company, profile).await))
    }

    async fn create_core(&self, signup: &SignupRequest) -> Result<Created, ProvisioningError> {
        let now = self.clock.now();
        let fields = &signup.fields;

        // A company left behind by an earlier attempt is reused, and is not
        // ours to delete if this attempt fails.
        let (company, owns_company) = match self
            .within("load company", self.tenants.find_company_by_signup(&signup.id))
            .await?
        {
            Some(company) => (company, false),
            None => self.insert_company(signup).await?,
        };

        let new_identity = NewIdentity {
            user_id: UserId::for_signup(&signup.id),
            display_name: fields.display_name.clone(),
            contact: fields.contact.clone(),
            email: fields.billing_email().map(str::to_string),
            routing_key: fields.routing_key.clone(),
        };
        let user_id = match self.create_identity(&new_identity).await {
            Ok(user_id) => user_id,
            Err(cause) => {
                if owns_company {
                    self.remove_company(&company).await;
                }
                if cause.is_unique_violation() {
                    return Err(ProvisioningError::IdentityTaken(cause.message));
                }
                return Err(cause.into());
            }
        };

        let profile = UserProfile {
            id: user_id.clone(),
            signup_request_id: signup.id,
            company_id: company.id,
            routing_key: fields.routing_key.clone(),
            display_name: fields.display_name.clone(),
            contact: fields.contact.clone(),
            email: fields.billing_email().map(str::to_string),
            created_at: now,
        };
        match self
            .within("insert profile", self.tenants.insert_profile(&profile))
            .await
        {
            Ok(()) => Ok(Created::New(company, profile)),
            // A concurrent attempt for this signup finished first. The
            // identity and company are shared with it.
            Err(cause) if cause.is_unique_violation() => {
                tracing::info!(signup_id = %signup.id, "concurrent provisioning won, fetching");
                match self.existing_bundle(signup).await? {
                    Some(bundle) => Ok(Created::Existing(bundle)),
                    None => Err(ProvisioningError::conflict(cause.message)),
                }
            }
            Err(cause) => Err(self
                .compensate_profile_failure(&company, owns_company, &user_id, cause)
                .await),
        }
    }

    async fn insert_company(
        &self,
        signup: &SignupRequest,
    ) -> Result<(Company, bool), ProvisioningError> {
        let fields = &signup.fields;
        let account_number = self
            .within(
                "next account number",
                self.tenants.next_account_number(&fields.routing_key),
            )
            .await?;
        let company = Company::new(
            fields.routing_key.clone(),
            fields.company_display_name(),
            account_number,
            signup.id,
            self.clock.now(),
        );
        match self
            .within("insert company", self.tenants.insert_company(&company))
            .await
        {
            Ok(()) => Ok((company, true)),
            Err(cause) if cause.is_unique_violation() => self
                .within("load company", self.tenants.find_company_by_signup(&signup.id))
                .await?
                .map(|winner| (winner, false))
                .ok_or_else(|| ProvisioningError::conflict(cause.message)),
            Err(cause) => Err(cause.into()),
        }
    }

    /// Creates the signup's identity. A unique violation on our own id means
    /// an earlier attempt created it and lost the response, so it is reused.
    /// A timed-out create may still have gone through, so it is deleted.
    async fn create_identity(&self, identity: &NewIdentity) -> Result<UserId, DomainError> {
        let cause = match self
            .within("create identity", self.identity.create_identity(identity))
            .await
        {
            Ok(user_id) => return Ok(user_id),
            Err(cause) => cause,
        };

        if cause.is_unique_violation() {
            let ours = self
                .within("find identity", self.identity.identity_exists(&identity.user_id))
                .await?;
            if ours {
                tracing::info!(user_id = %identity.user_id, "reusing identity from earlier attempt");
                return Ok(identity.user_id.clone());
            }
            return Err(cause);
        }
        if cause.code != ErrorCode::Timeout {
            return Err(cause);
        }

        if let Err(err) = self
            .within("delete identity", self.identity.delete_identity(&identity.user_id))
            .await
        {
            tracing::warn!(
                user_id = %identity.user_id,
                error = %err,
                "identity cleanup after timed-out create did not complete"
            );
        }
        Err(cause)
    }

    /// Deletes the identity, then the company. An identity that cannot be
    /// deleted is reported so an operator can remove it.
    async fn compensate_profile_failure(
        &self,
        company: &Company,
        owns_company: bool,
        user_id: &UserId,
        cause: DomainError,
    ) -> ProvisioningError {
        let cleanup = self
            .within("delete identity", self.identity.delete_identity(user_id))
            .await;
        if owns_company {
            self.remove_company(company).await;
        }

        match cleanup {
            Ok(()) => {
                tracing::warn!(
                    company_id = %company.id,
                    user_id = %user_id,
                    error = %cause,
                    "profile creation failed, identity removed"
                );
                cause.into()
            }
            Err(cleanup_error) => {
                tracing::error!(
                    company_id = %company.id,
                    user_id = %user_id,
                    error = %cause,
                    cleanup_error = %cleanup_error,
                    "profile creation failed and identity is orphaned"
                );
                ProvisioningError::CompensationFailed {
                    identity_id: user_id.to_string(),
                    cause: cause.to_string(),
                    cleanup_error: cleanup_error.to_string(),
                }
            }
        }
    }

    async fn remove_company(&self, company: &Company) {
        if let Err(err) = self
            .within("delete company", self.tenants.delete_company(&company.id))
            .await
        {
            tracing::warn!(company_id = %company.id, error = %err, "company cleanup failed");
        }
    }

    /// Runs one step under the step timeout. An elapsed timer is a failure.
    async fn within<T, F>(&self, step: &'static str, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::new(
                ErrorCode::Timeout,
                format!("{} timed out after {:?}", step, self.step_timeout),
            )),
        }
    }
}
