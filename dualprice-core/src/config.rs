//! Configuration for the annotation engine
//!
//! All knobs live here so nothing in the engine is a compile-time literal:
//! the currency pair, the fixed conversion rate, the marker class, the
//! checkout element names the client agent looks for, and the agent's timing
//! table. Tests vary these freely; deployments usually keep the defaults.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ConfigError;

/// The built-in fallback conversion rate (primary → secondary minor units).
pub fn default_rate() -> Decimal {
    // 1 EUR = 1.95583 BGN, the fixed peg of the observed deployment.
    Decimal::new(195_583, 5)
}

/// Engine-wide configuration.
///
/// Deserializable from JSON; every absent field falls back to the default
/// deployment values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Currency code in which authoritative prices are stored
    pub primary_currency: String,
    /// Symbol the primary currency renders with (used by text extraction)
    pub primary_symbol: String,
    /// Currency code of the derived, display-only currency
    pub secondary_currency: String,
    /// Textual marker that identifies an already-annotated display string
    pub secondary_marker: String,
    /// Fixed conversion rate applied to minor units
    pub rate: Decimal,
    /// CSS class used both as the idempotency guard and as the selector for
    /// appended secondary-price spans
    pub marker_class: String,
    /// Checkout element names and capability selectors for the client agent
    pub selectors: CheckoutSelectors,
    /// Timing table for the client agent
    pub timings: AgentTimings,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            primary_currency: "EUR".to_string(),
            primary_symbol: "\u{20ac}".to_string(),
            secondary_currency: "BGN".to_string(),
            secondary_marker: "BGN".to_string(),
            rate: default_rate(),
            marker_class: "dp-secondary-price".to_string(),
            selectors: CheckoutSelectors::default(),
            timings: AgentTimings::default(),
        }
    }
}

impl PricingConfig {
    /// Parse a configuration document, validating the result.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveRate(self.rate));
        }
        if self.primary_currency.is_empty() || self.secondary_currency.is_empty() {
            return Err(ConfigError::EmptyCurrencyCode);
        }
        if self.marker_class.is_empty() {
            return Err(ConfigError::EmptyMarkerClass);
        }
        Ok(())
    }
}

/// Element names and capability selectors of the checkout UI.
///
/// The checkout is a family of custom elements, several of which own shadow
/// trees. Everything the agent needs to find them is data, not code.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckoutSelectors {
    /// Checkout root custom element
    pub checkout_root: String,
    /// Flat total/price element (no shadow tree of its own)
    pub flat_total: String,
    /// Line-item list element (owns a shadow tree)
    pub line_items: String,
    /// Per-product line item inside the list's shadow tree
    pub product_line_item: String,
    /// Line-item wrapper inside the two-level total element
    pub line_item: String,
    /// Line-item total element (two shadow levels deep)
    pub line_item_total: String,
    /// Order summary element (owns a shadow tree)
    pub order_summary: String,
    /// Formatted-number leaf element used inside the order summary
    pub format_number: String,
    /// Named slot that carries a line item's price content
    pub price_slot: String,
    /// `part` attribute value marking a price amount
    pub price_part: String,
    /// Class marking a price amount
    pub price_amount_class: String,
    /// Class of the container a price amount is resolved to
    pub price_container_class: String,
    /// Custom event signaling a checkout state change
    pub checkout_event: String,
}

impl Default for CheckoutSelectors {
    fn default() -> Self {
        Self {
            checkout_root: "shop-checkout".to_string(),
            flat_total: "shop-total".to_string(),
            line_items: "shop-line-items".to_string(),
            product_line_item: "shop-product-line-item".to_string(),
            line_item: "shop-line-item".to_string(),
            line_item_total: "shop-line-item-total".to_string(),
            order_summary: "shop-order-summary".to_string(),
            format_number: "shop-format-number".to_string(),
            price_slot: "price".to_string(),
            price_part: "price__amount".to_string(),
            price_amount_class: "line-item__price-amount".to_string(),
            price_container_class: "price".to_string(),
            checkout_event: "shopCheckoutUpdated".to_string(),
        }
    }
}

/// Timing table for the client agent, in virtual milliseconds.
///
/// The defaults absorb the staged asynchronous rendering of the checkout UI;
/// tests compress them to keep scenarios short.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentTimings {
    /// Interval between checkout-root polls while waiting
    pub poll_interval_ms: u64,
    /// Wall-clock budget after which polling is abandoned
    pub poll_budget_ms: u64,
    /// Delays (from root discovery) of the fixed bootstrap re-scans
    pub bootstrap_scans_ms: Vec<u64>,
    /// Delays (from root discovery) of the shadow-root discovery passes
    pub discovery_passes_ms: Vec<u64>,
    /// Debounce window for mutation-triggered re-scans
    pub mutation_debounce_ms: u64,
    /// Debounce window for click/checkout-event re-scans
    pub interaction_debounce_ms: u64,
}

impl Default for AgentTimings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            poll_budget_ms: 10_000,
            bootstrap_scans_ms: vec![500, 1_000, 1_500, 2_000, 3_000],
            discovery_passes_ms: vec![500, 1_000, 2_000],
            mutation_debounce_ms: 100,
            interaction_debounce_ms: 300,
        }
    }
}

/// The single value injected into the client at page load.
///
/// The server renders the conversion rate once; absence falls back to the
/// built-in default so the agent still works without server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientSettings {
    /// Conversion rate injected by the server, if any
    #[serde(default)]
    pub rate: Option<Decimal>,
}

impl ClientSettings {
    /// Resolve the effective rate, falling back to the built-in default.
    pub fn resolve_rate(&self) -> Decimal {
        self.rate.unwrap_or_else(default_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PricingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.primary_currency, "EUR");
        assert_eq!(config.rate, Decimal::new(195_583, 5));
    }

    #[test]
    fn test_from_json_overrides() {
        let config =
            PricingConfig::from_json_str(r#"{"primary_currency":"USD","rate":"2.5"}"#).unwrap();
        assert_eq!(config.primary_currency, "USD");
        assert_eq!(config.rate, Decimal::new(25, 1));
        // Untouched fields keep their defaults.
        assert_eq!(config.marker_class, "dp-secondary-price");
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let err = PricingConfig::from_json_str(r#"{"rate":"0"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveRate(_)));
    }

    #[test]
    fn test_client_settings_fallback() {
        assert_eq!(ClientSettings::default().resolve_rate(), default_rate());
        let settings: ClientSettings = serde_json::from_str(r#"{"rate":"2.0"}"#).unwrap();
        assert_eq!(settings.resolve_rate(), Decimal::new(2, 0));
    }
}
