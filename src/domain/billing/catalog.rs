//! Mapping between price tiers and processor price ids.

use std::collections::HashMap;

use crate::domain::tenant::PriceTier;

/// Processor price ids per tier. Built from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceCatalog {
    prices: HashMap<PriceTier, String>,
}

impl PriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tier. Blank price ids are skipped.
    pub fn with_price(mut self, tier: PriceTier, price_id: impl Into<String>) -> Self {
        let price_id = price_id.into();
        if !price_id.trim().is_empty() {
            self.prices.insert(tier, price_id);
        }
        self
    }

    pub fn price_id(&self, tier: PriceTier) -> Option<&str> {
        self.prices.get(&tier).map(String::as_str)
    }

    /// Reverse lookup used when subscription events report a price.
    pub fn tier_for_price(&self, price_id: &str) -> Option<PriceTier> {
        self.prices
            .iter()
            .find(|(_, id)| id.as_str() == price_id)
            .map(|(tier, _)| *tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_both_directions() {
        let catalog = PriceCatalog::new()
            .with_price(PriceTier::Starter, "price_starter")
            .with_price(PriceTier::Growth, "price_growth");

        assert_eq!(catalog.price_id(PriceTier::Growth), Some("price_growth"));
        assert_eq!(catalog.tier_for_price("price_starter"), Some(PriceTier::Starter));
        assert_eq!(catalog.price_id(PriceTier::Scale), None);
        assert_eq!(catalog.tier_for_price("price_unknown"), None);
    }

    #[test]
    fn blank_price_ids_are_not_configured() {
        let catalog = PriceCatalog::new().with_price(PriceTier::Scale, "  ");
        assert_eq!(catalog.price_id(PriceTier::Scale), None);
    }
}
