//! Duplicate-safe annotation of JSON response payloads
//!
//! REST responses arrive as untyped JSON trees and must leave with the exact
//! same shape: values are mutated in place, fields are never removed or
//! renamed, and unknown fields pass through untouched. The same payload may
//! run through the annotator several times during one response assembly, and
//! the same line item may be reachable both standalone and through its parent
//! checkout's collection; both cases must annotate exactly once.

use std::collections::HashSet;

use log::trace;
use serde_json::{Map, Value};

use crate::config::PricingConfig;
use crate::convert::{Converter, CurrencyFormatter};
use crate::error::SkipReason;

/// Monetary field pairs recognized on a checkout.
const CHECKOUT_AMOUNT_FIELDS: &[(&str, &str)] = &[
    ("total_amount", "total_display_amount"),
    ("subtotal_amount", "subtotal_display_amount"),
    ("amount_due", "amount_due_display_amount"),
];

/// Monetary field pairs recognized on a line item.
const LINE_ITEM_AMOUNT_FIELDS: &[(&str, &str)] = &[
    ("scratch_amount", "scratch_display_amount"),
    ("subtotal_amount", "subtotal_display_amount"),
    ("ad_hoc_amount", "ad_hoc_display_amount"),
];

/// Appends secondary-currency parentheticals to the monetary display fields
/// of a response tree.
pub struct PayloadAnnotator<'a> {
    config: &'a PricingConfig,
    converter: &'a Converter,
    formatter: &'a dyn CurrencyFormatter,
}

impl<'a> PayloadAnnotator<'a> {
    /// Create an annotator borrowing the engine's shared pieces.
    pub fn new(
        config: &'a PricingConfig,
        converter: &'a Converter,
        formatter: &'a dyn CurrencyFormatter,
    ) -> Self {
        Self { config, converter, formatter }
    }

    /// Annotate a checkout payload, recursing into its line-item collection.
    pub fn annotate_checkout(&self, data: &mut Value) {
        let mut seen = HashSet::new();
        self.checkout_inner(data, &mut seen);
    }

    /// Annotate a line-item payload, recursing into an embedded checkout.
    ///
    /// When that checkout's collection contains the line item itself, the
    /// identity guard keeps it from being annotated a second time.
    pub fn annotate_line_item(&self, data: &mut Value) {
        let mut seen = HashSet::new();
        self.line_item_inner(data, &mut seen, None);
    }

    fn checkout_inner(&self, data: &mut Value, seen: &mut HashSet<String>) {
        let Some(object) = data.as_object_mut() else { return };
        if !self.currency_matches(object.get("currency")) {
            trace!("checkout skipped: {}", SkipReason::NotApplicable);
            return;
        }
        if let Some(id) = entity_id(object) {
            if !seen.insert(id) {
                return;
            }
        }
        self.annotate_fields(object, CHECKOUT_AMOUNT_FIELDS);

        let currency = object.get("currency").and_then(Value::as_str).map(str::to_owned);
        let items = match object.get_mut("line_items") {
            Some(Value::Object(collection)) => {
                collection.get_mut("data").and_then(Value::as_array_mut)
            }
            Some(Value::Array(items)) => Some(items),
            _ => None,
        };
        if let Some(items) = items {
            for item in items {
                self.line_item_inner(item, seen, currency.as_deref());
            }
        }
    }

    fn line_item_inner(
        &self,
        data: &mut Value,
        seen: &mut HashSet<String>,
        inherited_currency: Option<&str>,
    ) {
        let Some(object) = data.as_object_mut() else { return };
        // A line item rarely carries its own currency; resolve through the
        // embedded checkout, then the embedded price, then the parent.
        let currency = object
            .get("currency")
            .and_then(Value::as_str)
            .or_else(|| object.get("checkout").and_then(|c| c.get("currency")).and_then(Value::as_str))
            .or_else(|| object.get("price").and_then(|p| p.get("currency")).and_then(Value::as_str))
            .or(inherited_currency)
            .map(str::to_owned);
        let Some(currency) = currency else {
            trace!("line item skipped: {}", SkipReason::NotApplicable);
            return;
        };
        if !currency.eq_ignore_ascii_case(&self.config.primary_currency) {
            trace!("line item skipped: {}", SkipReason::NotApplicable);
            return;
        }
        if let Some(id) = entity_id(object) {
            if !seen.insert(id) {
                trace!("line item already annotated in this pass");
                return;
            }
        }
        self.annotate_fields(object, LINE_ITEM_AMOUNT_FIELDS);

        if let Some(checkout) = object.get_mut("checkout") {
            self.checkout_inner(checkout, seen);
        }
    }

    fn annotate_fields(&self, object: &mut Map<String, Value>, pairs: &[(&str, &str)]) {
        for (amount_field, display_field) in pairs {
            let Some(amount) = object.get(*amount_field).and_then(Value::as_i64) else {
                continue;
            };
            let Some(secondary) = self.converter.secondary_display(amount, self.formatter) else {
                trace!("{}: {}", amount_field, SkipReason::NotApplicable);
                continue;
            };
            let Some(display) = object.get(*display_field).and_then(Value::as_str) else {
                continue;
            };
            if display.is_empty() {
                continue;
            }
            if display.contains(&self.config.secondary_marker) {
                trace!("{} already carries the secondary marker", display_field);
                continue;
            }
            let annotated = format!("{} ({})", display, secondary);
            object.insert((*display_field).to_string(), Value::String(annotated));
        }
    }

    fn currency_matches(&self, value: Option<&Value>) -> bool {
        value
            .and_then(Value::as_str)
            .is_some_and(|code| code.eq_ignore_ascii_case(&self.config.primary_currency))
    }
}

fn entity_id(object: &Map<String, Value>) -> Option<String> {
    match object.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rate;
    use crate::convert::{FixedLocaleFormatter, SymbolPlacement};
    use serde_json::json;

    fn fixture() -> (PricingConfig, Converter, FixedLocaleFormatter) {
        (
            PricingConfig::default(),
            Converter::new(default_rate()),
            FixedLocaleFormatter::new("BGN", SymbolPlacement::Prefix),
        )
    }

    #[test]
    fn test_annotates_checkout_fields() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        let mut data = json!({
            "id": "ch_1",
            "currency": "eur",
            "total_amount": 1000,
            "total_display_amount": "\u{20ac}10.00",
            "subtotal_amount": 800,
            "subtotal_display_amount": "\u{20ac}8.00",
            "amount_due": 1000,
            "amount_due_display_amount": "\u{20ac}10.00",
            "status": "open"
        });
        annotator.annotate_checkout(&mut data);
        assert_eq!(data["total_display_amount"], "\u{20ac}10.00 (BGN 19.56)");
        assert_eq!(data["subtotal_display_amount"], "\u{20ac}8.00 (BGN 15.65)");
        assert_eq!(data["amount_due_display_amount"], "\u{20ac}10.00 (BGN 19.56)");
        // Unrelated fields pass through untouched.
        assert_eq!(data["status"], "open");
    }

    #[test]
    fn test_is_idempotent_across_passes() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        let mut data = json!({
            "id": "ch_1",
            "currency": "eur",
            "total_amount": 1000,
            "total_display_amount": "\u{20ac}10.00"
        });
        annotator.annotate_checkout(&mut data);
        let once = data.clone();
        annotator.annotate_checkout(&mut data);
        assert_eq!(data, once);
    }

    #[test]
    fn test_other_currency_passes_through() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        let mut data = json!({
            "id": "ch_2",
            "currency": "usd",
            "total_amount": 1000,
            "total_display_amount": "$10.00"
        });
        let before = data.clone();
        annotator.annotate_checkout(&mut data);
        assert_eq!(data, before);
    }

    #[test]
    fn test_zero_amount_is_not_annotated() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        let mut data = json!({
            "currency": "eur",
            "total_amount": 0,
            "total_display_amount": "\u{20ac}0.00"
        });
        annotator.annotate_checkout(&mut data);
        assert_eq!(data["total_display_amount"], "\u{20ac}0.00");
    }

    #[test]
    fn test_line_item_collection_annotated_once() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        let mut data = json!({
            "id": "ch_1",
            "currency": "eur",
            "total_amount": 2550,
            "total_display_amount": "\u{20ac}25.50",
            "line_items": {
                "data": [{
                    "id": "li_1",
                    "subtotal_amount": 2550,
                    "subtotal_display_amount": "\u{20ac}25.50"
                }]
            }
        });
        annotator.annotate_checkout(&mut data);
        assert_eq!(
            data["line_items"]["data"][0]["subtotal_display_amount"],
            "\u{20ac}25.50 (BGN 49.87)"
        );
    }

    #[test]
    fn test_shared_line_item_annotated_exactly_once() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        // The line item embeds its checkout, whose collection contains the
        // same line item again.
        let mut data = json!({
            "id": "li_1",
            "subtotal_amount": 1000,
            "subtotal_display_amount": "\u{20ac}10.00",
            "checkout": {
                "id": "ch_1",
                "currency": "eur",
                "total_amount": 1000,
                "total_display_amount": "\u{20ac}10.00",
                "line_items": {
                    "data": [{
                        "id": "li_1",
                        "subtotal_amount": 1000,
                        "subtotal_display_amount": "\u{20ac}10.00"
                    }]
                }
            }
        });
        annotator.annotate_line_item(&mut data);
        assert_eq!(data["subtotal_display_amount"], "\u{20ac}10.00 (BGN 19.56)");
        assert_eq!(data["checkout"]["total_display_amount"], "\u{20ac}10.00 (BGN 19.56)");
        // The nested copy shares the top-level item's identity and is skipped.
        assert_eq!(
            data["checkout"]["line_items"]["data"][0]["subtotal_display_amount"],
            "\u{20ac}10.00"
        );
    }

    #[test]
    fn test_line_item_currency_resolved_from_price() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        let mut data = json!({
            "id": "li_9",
            "ad_hoc_amount": 500,
            "ad_hoc_display_amount": "\u{20ac}5.00",
            "price": { "id": "pr_1", "currency": "eur" }
        });
        annotator.annotate_line_item(&mut data);
        assert_eq!(data["ad_hoc_display_amount"], "\u{20ac}5.00 (BGN 9.78)");
    }

    #[test]
    fn test_missing_display_field_is_left_alone() {
        let (config, converter, formatter) = fixture();
        let annotator = PayloadAnnotator::new(&config, &converter, &formatter);
        let mut data = json!({
            "currency": "eur",
            "total_amount": 1000
        });
        let before = data.clone();
        annotator.annotate_checkout(&mut data);
        assert_eq!(data, before);
    }
}
