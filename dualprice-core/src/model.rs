//! Typed priced entities and their attribute-set annotation
//!
//! The host platform hands these models to the engine at "attributes set"
//! time, before any markup or payload work happens. Each entity knows how to
//! write its own secondary display fields exactly once; unknown fields ride
//! along in a flattened map so round-tripping an entity never loses data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PricingConfig;
use crate::convert::{Converter, CurrencyFormatter};

/// A product price.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Price {
    /// Platform identifier
    pub id: String,
    /// Currency code the amount is stored in
    #[serde(default)]
    pub currency: String,
    /// Amount in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    /// Primary-currency display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_amount: Option<String>,
    /// Secondary-currency display string, written by the attribute-set hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_display_amount: Option<String>,
    /// Fields this engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Price {
    /// Write the secondary display amount, once, when the price is eligible.
    pub fn apply_secondary_pricing(
        &mut self,
        config: &PricingConfig,
        converter: &Converter,
        formatter: &dyn CurrencyFormatter,
    ) {
        if !self.currency.eq_ignore_ascii_case(&config.primary_currency) {
            return;
        }
        if self.secondary_display_amount.as_deref().is_some_and(|s| !s.is_empty()) {
            return;
        }
        let Some(amount) = self.amount else { return };
        self.secondary_display_amount = converter.secondary_display(amount, formatter);
    }
}

/// A product variant; priced like a [`Price`] but addressed separately by the
/// host platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variant {
    /// Platform identifier
    pub id: String,
    /// Currency code the amount is stored in
    #[serde(default)]
    pub currency: String,
    /// Amount in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    /// Secondary-currency display string, written by the attribute-set hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_display_amount: Option<String>,
    /// Fields this engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Variant {
    /// Write the secondary display amount, once, when the variant is eligible.
    pub fn apply_secondary_pricing(
        &mut self,
        config: &PricingConfig,
        converter: &Converter,
        formatter: &dyn CurrencyFormatter,
    ) {
        if !self.currency.eq_ignore_ascii_case(&config.primary_currency) {
            return;
        }
        if self.secondary_display_amount.as_deref().is_some_and(|s| !s.is_empty()) {
            return;
        }
        let Some(amount) = self.amount else { return };
        self.secondary_display_amount = converter.secondary_display(amount, formatter);
    }
}

/// One line of a checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItem {
    /// Platform identifier
    pub id: String,
    /// Ad-hoc amount in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_hoc_amount: Option<i64>,
    /// Ad-hoc display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_hoc_display_amount: Option<String>,
    /// Subtotal in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal_amount: Option<i64>,
    /// Subtotal display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal_display_amount: Option<String>,
    /// List ("scratch") amount in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_amount: Option<i64>,
    /// List ("scratch") display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_display_amount: Option<String>,
    /// Expanded price, when the platform includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// Expanded parent checkout, when the platform includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout: Option<Box<Checkout>>,
    /// Fields this engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineItem {
    /// Currency this line item is priced in: the expanded checkout's, then
    /// the expanded price's.
    pub fn resolved_currency(&self) -> Option<&str> {
        self.checkout
            .as_deref()
            .map(|checkout| checkout.currency.as_str())
            .filter(|code| !code.is_empty())
            .or_else(|| {
                self.price
                    .as_ref()
                    .map(|price| price.currency.as_str())
                    .filter(|code| !code.is_empty())
            })
    }

    /// Append the secondary parenthetical to each present display field, once.
    pub fn apply_secondary_pricing(
        &mut self,
        config: &PricingConfig,
        converter: &Converter,
        formatter: &dyn CurrencyFormatter,
    ) {
        let eligible = self
            .resolved_currency()
            .is_some_and(|code| code.eq_ignore_ascii_case(&config.primary_currency));
        if !eligible {
            return;
        }
        append_secondary(
            &mut self.ad_hoc_display_amount,
            self.ad_hoc_amount,
            config,
            converter,
            formatter,
        );
        append_secondary(
            &mut self.subtotal_display_amount,
            self.subtotal_amount,
            config,
            converter,
            formatter,
        );
        append_secondary(
            &mut self.scratch_display_amount,
            self.scratch_amount,
            config,
            converter,
            formatter,
        );
    }
}

/// A checkout with its totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkout {
    /// Platform identifier
    pub id: String,
    /// Currency code the totals are stored in
    #[serde(default)]
    pub currency: String,
    /// Total in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<i64>,
    /// Total display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_display_amount: Option<String>,
    /// Subtotal in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal_amount: Option<i64>,
    /// Subtotal display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal_display_amount: Option<String>,
    /// Amount still due, in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_due: Option<i64>,
    /// Amount-due display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_due_display_amount: Option<String>,
    /// Line-item collection, when expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<LineItemCollection>,
    /// Fields this engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Checkout {
    /// Append the secondary parenthetical to each present display field, once.
    ///
    /// This touches the checkout's own totals only; recursing into the
    /// line-item collection is the payload annotator's job.
    pub fn apply_secondary_pricing(
        &mut self,
        config: &PricingConfig,
        converter: &Converter,
        formatter: &dyn CurrencyFormatter,
    ) {
        if !self.currency.eq_ignore_ascii_case(&config.primary_currency) {
            return;
        }
        append_secondary(
            &mut self.total_display_amount,
            self.total_amount,
            config,
            converter,
            formatter,
        );
        append_secondary(
            &mut self.subtotal_display_amount,
            self.subtotal_amount,
            config,
            converter,
            formatter,
        );
        append_secondary(
            &mut self.amount_due_display_amount,
            self.amount_due,
            config,
            converter,
            formatter,
        );
    }
}

/// A paged collection of line items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemCollection {
    /// The items on this page
    #[serde(default)]
    pub data: Vec<LineItem>,
    /// Paging fields this engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Marker-guarded in-place append of the parenthetical secondary value.
fn append_secondary(
    display: &mut Option<String>,
    amount: Option<i64>,
    config: &PricingConfig,
    converter: &Converter,
    formatter: &dyn CurrencyFormatter,
) {
    let Some(amount) = amount else { return };
    let Some(secondary) = converter.secondary_display(amount, formatter) else { return };
    if let Some(current) = display {
        if !current.is_empty() && !current.contains(&config.secondary_marker) {
            current.push_str(&format!(" ({})", secondary));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rate;
    use crate::convert::{FixedLocaleFormatter, SymbolPlacement};

    fn fixture() -> (PricingConfig, Converter, FixedLocaleFormatter) {
        (
            PricingConfig::default(),
            Converter::new(default_rate()),
            FixedLocaleFormatter::new("BGN", SymbolPlacement::Prefix),
        )
    }

    #[test]
    fn test_price_attribute_set() {
        let (config, converter, formatter) = fixture();
        let mut price = Price {
            id: "pr_1".to_string(),
            currency: "eur".to_string(),
            amount: Some(1000),
            ..Price::default()
        };
        price.apply_secondary_pricing(&config, &converter, &formatter);
        assert_eq!(price.secondary_display_amount.as_deref(), Some("BGN 19.56"));

        // A second pass leaves the field alone.
        price.apply_secondary_pricing(&config, &converter, &formatter);
        assert_eq!(price.secondary_display_amount.as_deref(), Some("BGN 19.56"));
    }

    #[test]
    fn test_price_other_currency_untouched() {
        let (config, converter, formatter) = fixture();
        let mut price = Price {
            id: "pr_2".to_string(),
            currency: "usd".to_string(),
            amount: Some(1000),
            ..Price::default()
        };
        price.apply_secondary_pricing(&config, &converter, &formatter);
        assert_eq!(price.secondary_display_amount, None);
    }

    #[test]
    fn test_line_item_currency_chain() {
        let (config, converter, formatter) = fixture();
        let mut item = LineItem {
            id: "li_1".to_string(),
            subtotal_amount: Some(2550),
            subtotal_display_amount: Some("\u{20ac}25.50".to_string()),
            price: Some(Price { currency: "eur".to_string(), ..Price::default() }),
            ..LineItem::default()
        };
        item.apply_secondary_pricing(&config, &converter, &formatter);
        assert_eq!(item.subtotal_display_amount.as_deref(), Some("\u{20ac}25.50 (BGN 49.87)"));

        // The embedded checkout's currency takes precedence over the price's.
        let mut item = LineItem {
            id: "li_2".to_string(),
            subtotal_amount: Some(1000),
            subtotal_display_amount: Some("\u{20ac}10.00".to_string()),
            price: Some(Price { currency: "eur".to_string(), ..Price::default() }),
            checkout: Some(Box::new(Checkout {
                currency: "usd".to_string(),
                ..Checkout::default()
            })),
            ..LineItem::default()
        };
        item.apply_secondary_pricing(&config, &converter, &formatter);
        assert_eq!(item.subtotal_display_amount.as_deref(), Some("\u{20ac}10.00"));
    }

    #[test]
    fn test_checkout_totals() {
        let (config, converter, formatter) = fixture();
        let mut checkout = Checkout {
            id: "ch_1".to_string(),
            currency: "eur".to_string(),
            total_amount: Some(1000),
            total_display_amount: Some("\u{20ac}10.00".to_string()),
            amount_due: Some(0),
            amount_due_display_amount: Some("\u{20ac}0.00".to_string()),
            ..Checkout::default()
        };
        checkout.apply_secondary_pricing(&config, &converter, &formatter);
        assert_eq!(checkout.total_display_amount.as_deref(), Some("\u{20ac}10.00 (BGN 19.56)"));
        // Zero amounts never annotate.
        assert_eq!(checkout.amount_due_display_amount.as_deref(), Some("\u{20ac}0.00"));
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = r#"{"id":"pr_1","currency":"eur","amount":1000,"archived":false}"#;
        let price: Price = serde_json::from_str(raw).unwrap();
        assert_eq!(price.extra["archived"], false);
        let back = serde_json::to_value(&price).unwrap();
        assert_eq!(back["archived"], false);
    }
}
