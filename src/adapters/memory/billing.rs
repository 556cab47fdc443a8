//! `CustomerRepository` and `LeadRepository` for the in-memory store.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::billing::Lead;
use crate::domain::foundation::{CompanyId, CustomerId, DomainError, LeadId, RoutingKey};
use crate::domain::tenant::Customer;
use crate::ports::{CustomerRepository, LeadRepository};

use super::store::{conflict, duplicate, missing, InMemoryStore, StoreOperation};

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn find_by_company(
        &self,
        company_id: &CompanyId,
        routing_key: &RoutingKey,
    ) -> Result<Option<Customer>, DomainError> {
        Ok(self
            .customers
            .read()
            .await
            .values()
            .find(|c| c.company_id.as_ref() == Some(company_id) && &c.routing_key == routing_key)
            .cloned())
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<Customer>, DomainError> {
        Ok(self
            .customers
            .read()
            .await
            .values()
            .find(|c| c.stripe_customer_id.as_deref() == Some(stripe_customer_id))
            .cloned())
    }

    async fn insert(&self, customer: &Customer) -> Result<(), DomainError> {
        self.check(StoreOperation::InsertCustomer).await?;
        let mut customers = self.customers.write().await;
        if customers.contains_key(&customer.id) {
            return Err(duplicate("customers_pkey"));
        }
        check_customer_keys(&customers, customer)?;
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update(&self, customer: &Customer) -> Result<(), DomainError> {
        self.check(StoreOperation::UpdateCustomer).await?;
        let mut customers = self.customers.write().await;
        check_customer_keys(&customers, customer)?;
        let stored = customers
            .get_mut(&customer.id)
            .ok_or_else(|| missing("customer", customer.id))?;
        if stored.version != customer.version {
            return Err(conflict("customer", customer.id, customer.version));
        }
        let mut next = customer.clone();
        next.version += 1;
        *stored = next;
        Ok(())
    }
}

/// Unique keys shared with rows other than `customer` itself.
fn check_customer_keys(
    customers: &HashMap<CustomerId, Customer>,
    customer: &Customer,
) -> Result<(), DomainError> {
    let others = || customers.values().filter(|c| c.id != customer.id);
    if let Some(company_id) = customer.company_id {
        if others()
            .any(|c| c.company_id == Some(company_id) && c.routing_key == customer.routing_key)
        {
            return Err(duplicate("customers_company_id_routing_key_key"));
        }
    }
    if let Some(stripe_id) = customer.stripe_customer_id.as_deref() {
        if others().any(|c| c.stripe_customer_id.as_deref() == Some(stripe_id)) {
            return Err(duplicate("customers_stripe_customer_id_key"));
        }
    }
    Ok(())
}

#[async_trait]
impl LeadRepository for InMemoryStore {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Lead>, DomainError> {
        Ok(self
            .leads
            .read()
            .await
            .values()
            .find(|l| l.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn find_by_email(
        &self,
        email: &str,
        routing_key: &RoutingKey,
    ) -> Result<Option<Lead>, DomainError> {
        Ok(self
            .leads
            .read()
            .await
            .values()
            .find(|l| l.email.as_deref() == Some(email) && &l.routing_key == routing_key)
            .cloned())
    }

    async fn insert(&self, lead: &Lead) -> Result<(), DomainError> {
        self.check(StoreOperation::InsertLead).await?;
        let mut leads = self.leads.write().await;
        if leads.contains_key(&lead.id) {
            return Err(duplicate("leads_pkey"));
        }
        check_lead_keys(&leads, lead)?;
        leads.insert(lead.id, lead.clone());
        Ok(())
    }

    async fn update(&self, lead: &Lead) -> Result<(), DomainError> {
        self.check(StoreOperation::UpdateLead).await?;
        let mut leads = self.leads.write().await;
        check_lead_keys(&leads, lead)?;
        let stored = leads.get_mut(&lead.id).ok_or_else(|| missing("lead", lead.id))?;
        if stored.version != lead.version {
            return Err(conflict("lead", lead.id, lead.version));
        }
        let mut next = lead.clone();
        next.version += 1;
        *stored = next;
        Ok(())
    }
}

fn check_lead_keys(leads: &HashMap<LeadId, Lead>, lead: &Lead) -> Result<(), DomainError> {
    let others = || leads.values().filter(|l| l.id != lead.id);
    if let Some(session_id) = lead.checkout_session_id.as_deref() {
        if others().any(|l| l.checkout_session_id.as_deref() == Some(session_id)) {
            return Err(duplicate("leads_checkout_session_id_key"));
        }
    }
    if let Some(email) = lead.email.as_deref() {
        if others().any(|l| l.email.as_deref() == Some(email) && l.routing_key == lead.routing_key)
        {
            return Err(duplicate("leads_email_routing_key_key"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{CheckoutIdentifiers, LeadStatus};
    use crate::domain::foundation::Timestamp;
    use std::collections::BTreeMap;

    fn key() -> RoutingKey {
        RoutingKey::new("textline").unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000)
    }

    #[tokio::test]
    async fn processor_customer_id_is_unique() {
        let store = InMemoryStore::new();
        let first = Customer::from_processor("cus_1", None, key(), None, now());
        let second = Customer::from_processor("cus_1", None, key(), None, now());

        CustomerRepository::insert(&store, &first).await.unwrap();
        let err = CustomerRepository::insert(&store, &second).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn update_cannot_take_another_rows_processor_id() {
        let store = InMemoryStore::new();
        let first = Customer::from_processor("cus_1", None, key(), None, now());
        let mut second = Customer::shell(CompanyId::new(), key(), None, now());
        CustomerRepository::insert(&store, &first).await.unwrap();
        CustomerRepository::insert(&store, &second).await.unwrap();

        second.stripe_customer_id = Some("cus_1".to_string());
        let err = CustomerRepository::update(&store, &second).await.unwrap_err();
        assert!(err.is_unique_violation());

        // Rewriting a row with its own keys is fine.
        CustomerRepository::update(&store, &first).await.unwrap();
    }

    #[tokio::test]
    async fn customer_found_by_company_and_processor_id() {
        let store = InMemoryStore::new();
        let company_id = CompanyId::new();
        let mut customer = Customer::shell(company_id, key(), None, now());
        customer.stripe_customer_id = Some("cus_7".to_string());
        CustomerRepository::insert(&store, &customer).await.unwrap();

        assert!(store.find_by_company(&company_id, &key()).await.unwrap().is_some());
        assert!(store.find_by_stripe_customer_id("cus_7").await.unwrap().is_some());
        assert!(store
            .find_by_company(&company_id, &RoutingKey::new("promo").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn lead_email_is_unique_per_routing_key() {
        let store = InMemoryStore::new();
        let lead = |session: &str| {
            Lead::new(
                Some("buyer@example.com".to_string()),
                key(),
                LeadStatus::Converted,
                &CheckoutIdentifiers {
                    checkout_session_id: session.to_string(),
                    ..Default::default()
                },
                BTreeMap::new(),
                now(),
            )
        };

        LeadRepository::insert(&store, &lead("cs_1")).await.unwrap();
        let err = LeadRepository::insert(&store, &lead("cs_2")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn lead_update_keeps_session_and_email_unique() {
        let store = InMemoryStore::new();
        let lead = |email: Option<&str>, session: &str| {
            Lead::new(
                email.map(str::to_string),
                key(),
                LeadStatus::Abandoned,
                &CheckoutIdentifiers {
                    checkout_session_id: session.to_string(),
                    ..Default::default()
                },
                BTreeMap::new(),
                now(),
            )
        };
        let first = lead(Some("buyer@example.com"), "cs_1");
        let mut second = lead(None, "cs_2");
        LeadRepository::insert(&store, &first).await.unwrap();
        LeadRepository::insert(&store, &second).await.unwrap();

        second.email = Some("buyer@example.com".to_string());
        let err = LeadRepository::update(&store, &second).await.unwrap_err();
        assert!(err.is_unique_violation());

        second.email = None;
        second.checkout_session_id = Some("cs_1".to_string());
        let err = LeadRepository::update(&store, &second).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn stale_lead_update_conflicts() {
        let store = InMemoryStore::new();
        let lead = Lead::new(
            None,
            key(),
            LeadStatus::Abandoned,
            &CheckoutIdentifiers {
                checkout_session_id: "cs_1".to_string(),
                ..Default::default()
            },
            BTreeMap::new(),
            now(),
        );
        LeadRepository::insert(&store, &lead).await.unwrap();
        LeadRepository::update(&store, &lead).await.unwrap();

        let err = LeadRepository::update(&store, &lead).await.unwrap_err();
        assert!(err.is_concurrency_conflict());
    }
}
