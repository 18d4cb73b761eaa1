//! Registration tables for the host framework's dispatch points
//!
//! The host CMS dispatches "render block" and "REST response" events; this
//! module models those as data (a block identifier mapped to a handler, a
//! route prefix mapped to a handler) so the annotation logic never touches
//! the dispatch mechanism itself. Unrecognized blocks and routes pass
//! through unchanged.

use std::collections::HashMap;
use std::rc::Rc;

use log::trace;
use serde_json::Value;

use crate::config::PricingConfig;
use crate::convert::{Converter, CurrencyFormatter};
use crate::error::HooksError;
use crate::markup;
use crate::model::{Price, Variant};
use crate::payload::PayloadAnnotator;

/// Block identifier of the selected-price amount block.
pub const SELECTED_PRICE_BLOCK: &str = "shop/selected-price-amount";
/// Block identifier of the list-price block.
pub const LIST_PRICE_BLOCK: &str = "shop/list-price";
/// Route prefix of checkout REST responses.
pub const CHECKOUTS_ROUTE: &str = "/shop/v1/checkouts";
/// Route prefix of line-item REST responses.
pub const LINE_ITEMS_ROUTE: &str = "/shop/v1/line_items";

/// Everything a block handler may need about the product being rendered.
#[derive(Debug, Clone, Default)]
pub struct BlockContext {
    /// The price currently selected on the product page
    pub selected_price: Option<Price>,
    /// The product's initial price
    pub initial_price: Option<Price>,
    /// The product's variants
    pub variants: Vec<Variant>,
}

/// Handler for one rendered block: fragment in, fragment out.
pub type BlockHandler = Box<dyn Fn(&str, &BlockContext) -> String>;
/// Handler for one REST response tree, mutating in place.
pub type RouteHandler = Box<dyn Fn(&mut Value)>;

/// Registration table for "render block" dispatch.
#[derive(Default)]
pub struct BlockRegistry {
    handlers: HashMap<String, BlockHandler>,
}

impl BlockRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a block identifier.
    pub fn register(
        &mut self,
        block: impl Into<String>,
        handler: BlockHandler,
    ) -> Result<(), HooksError> {
        let block = block.into();
        if self.handlers.contains_key(&block) {
            return Err(HooksError::DuplicateBlock(block));
        }
        self.handlers.insert(block, handler);
        Ok(())
    }

    /// Render a block: recognized identifiers run their handler, everything
    /// else passes through unchanged.
    pub fn render(&self, block: &str, fragment: &str, context: &BlockContext) -> String {
        match self.handlers.get(block) {
            Some(handler) => handler(fragment, context),
            None => fragment.to_string(),
        }
    }
}

/// Registration table for REST response dispatch, keyed by route prefix.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<(String, RouteHandler)>,
}

impl RouteTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a route prefix.
    pub fn register(
        &mut self,
        prefix: impl Into<String>,
        handler: RouteHandler,
    ) -> Result<(), HooksError> {
        let prefix = prefix.into();
        if self.routes.iter().any(|(existing, _)| *existing == prefix) {
            return Err(HooksError::DuplicateRoute(prefix));
        }
        self.routes.push((prefix, handler));
        Ok(())
    }

    /// Dispatch a response to the first handler whose prefix matches the
    /// route; unrecognized routes pass through unchanged.
    pub fn dispatch(&self, route: &str, response: &mut Value) {
        match self.routes.iter().find(|(prefix, _)| route.starts_with(prefix.as_str())) {
            Some((_, handler)) => handler(response),
            None => trace!("route {:?} not recognized; passing through", route),
        }
    }
}

/// The block registry with the built-in handlers registered.
///
/// Both handlers check the fragment for the marker class before doing any
/// work: the surrounding framework may render the same block more than once
/// per page, and the second pass must be a no-op.
pub fn default_block_registry(
    config: Rc<PricingConfig>,
    converter: Rc<Converter>,
    formatter: Rc<dyn CurrencyFormatter>,
) -> BlockRegistry {
    let mut registry = BlockRegistry::new();

    {
        let config = config.clone();
        let converter = converter.clone();
        let formatter = formatter.clone();
        registry.handlers.insert(
            SELECTED_PRICE_BLOCK.to_string(),
            Box::new(move |fragment, context| {
                if fragment.contains(config.marker_class.as_str()) {
                    return fragment.to_string();
                }
                let Some(secondary) = context
                    .selected_price
                    .as_ref()
                    .and_then(|price| secondary_for_price(price, &config, &converter, formatter.as_ref()))
                else {
                    return fragment.to_string();
                };
                let span = format!(
                    "<span class=\"{}\"> ({})</span>",
                    config.marker_class, secondary
                );
                markup::inject_before_closing(fragment, "span", &span)
            }),
        );
    }

    registry.handlers.insert(
        LIST_PRICE_BLOCK.to_string(),
        Box::new(move |fragment, context| {
            if fragment.contains(config.marker_class.as_str()) {
                return fragment.to_string();
            }
            let Some(secondary) = context
                .initial_price
                .as_ref()
                .and_then(|price| secondary_for_price(price, &config, &converter, formatter.as_ref()))
            else {
                return fragment.to_string();
            };
            let span =
                format!(" <span class=\"{}\">({})</span>", config.marker_class, secondary);
            markup::inject_before_closing(fragment, "div", &span)
        }),
    );

    registry
}

/// The route table with the built-in handlers registered.
pub fn default_route_table(
    config: Rc<PricingConfig>,
    converter: Rc<Converter>,
    formatter: Rc<dyn CurrencyFormatter>,
) -> RouteTable {
    let mut table = RouteTable::new();

    {
        let config = config.clone();
        let converter = converter.clone();
        let formatter = formatter.clone();
        table.routes.push((
            CHECKOUTS_ROUTE.to_string(),
            Box::new(move |response| {
                let annotator = PayloadAnnotator::new(&config, &converter, formatter.as_ref());
                for_each_entity(response, |entity| annotator.annotate_checkout(entity));
            }),
        ));
    }

    table.routes.push((
        LINE_ITEMS_ROUTE.to_string(),
        Box::new(move |response| {
            let annotator = PayloadAnnotator::new(&config, &converter, formatter.as_ref());
            for_each_entity(response, |entity| annotator.annotate_line_item(entity));
        }),
    ));

    table
}

// List endpoints return an array (possibly paged under "data"); item
// endpoints return one object.
fn for_each_entity(response: &mut Value, annotate: impl Fn(&mut Value)) {
    if let Value::Array(entities) = response {
        for entity in entities {
            annotate(entity);
        }
        return;
    }
    let paged = response
        .as_object()
        .and_then(|object| object.get("data"))
        .is_some_and(Value::is_array);
    if paged {
        if let Some(Value::Array(entities)) =
            response.as_object_mut().and_then(|object| object.get_mut("data"))
        {
            for entity in entities {
                annotate(entity);
            }
        }
    } else {
        annotate(response);
    }
}

fn secondary_for_price(
    price: &Price,
    config: &PricingConfig,
    converter: &Converter,
    formatter: &dyn CurrencyFormatter,
) -> Option<String> {
    // Prefer the display value the attribute-set hook already produced.
    if let Some(display) = price.secondary_display_amount.as_ref().filter(|s| !s.is_empty()) {
        return Some(display.clone());
    }
    if !price.currency.eq_ignore_ascii_case(&config.primary_currency) {
        return None;
    }
    converter.secondary_display(price.amount?, formatter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rate;
    use crate::convert::{FixedLocaleFormatter, SymbolPlacement};
    use serde_json::json;

    fn registries() -> (BlockRegistry, RouteTable) {
        let config = Rc::new(PricingConfig::default());
        let converter = Rc::new(Converter::new(default_rate()));
        let formatter: Rc<dyn CurrencyFormatter> =
            Rc::new(FixedLocaleFormatter::new("BGN", SymbolPlacement::Prefix));
        (
            default_block_registry(config.clone(), converter.clone(), formatter.clone()),
            default_route_table(config, converter, formatter),
        )
    }

    fn eur_price(amount: i64) -> Price {
        Price {
            id: "pr_1".to_string(),
            currency: "eur".to_string(),
            amount: Some(amount),
            ..Price::default()
        }
    }

    #[test]
    fn test_unrecognized_block_passes_through() {
        let (blocks, _) = registries();
        let context = BlockContext::default();
        assert_eq!(blocks.render("shop/gallery", "<div>x</div>", &context), "<div>x</div>");
    }

    #[test]
    fn test_selected_price_block_injects_span() {
        let (blocks, _) = registries();
        let context = BlockContext { selected_price: Some(eur_price(1000)), ..Default::default() };
        let fragment = "<span class=\"amount\">\u{20ac}10.00</span>";
        let rendered = blocks.render(SELECTED_PRICE_BLOCK, fragment, &context);
        assert_eq!(
            rendered,
            "<span class=\"amount\">\u{20ac}10.00\
             <span class=\"dp-secondary-price\"> (BGN 19.56)</span></span>"
        );

        // Rendering the already-annotated fragment again is a no-op.
        assert_eq!(blocks.render(SELECTED_PRICE_BLOCK, &rendered, &context), rendered);
    }

    #[test]
    fn test_selected_price_block_skips_nested_inner_span() {
        let (blocks, _) = registries();
        let context = BlockContext { selected_price: Some(eur_price(1000)), ..Default::default() };
        let fragment = "<span>A<span>B</span>C</span>";
        let rendered = blocks.render(SELECTED_PRICE_BLOCK, fragment, &context);
        assert!(rendered.ends_with("C<span class=\"dp-secondary-price\"> (BGN 19.56)</span></span>"));
        assert!(rendered.starts_with("<span>A<span>B</span>"));
    }

    #[test]
    fn test_list_price_block_uses_initial_price() {
        let (blocks, _) = registries();
        let context = BlockContext { initial_price: Some(eur_price(2550)), ..Default::default() };
        let fragment = "<div class=\"list-price\">\u{20ac}25.50</div>";
        let rendered = blocks.render(LIST_PRICE_BLOCK, fragment, &context);
        assert_eq!(
            rendered,
            "<div class=\"list-price\">\u{20ac}25.50 \
             <span class=\"dp-secondary-price\">(BGN 49.87)</span></div>"
        );
    }

    #[test]
    fn test_block_without_eligible_price_is_untouched() {
        let (blocks, _) = registries();
        let mut price = eur_price(1000);
        price.currency = "usd".to_string();
        let context = BlockContext { selected_price: Some(price), ..Default::default() };
        let fragment = "<span>$10.00</span>";
        assert_eq!(blocks.render(SELECTED_PRICE_BLOCK, fragment, &context), fragment);
    }

    #[test]
    fn test_route_dispatch_annotates_checkout() {
        let (_, routes) = registries();
        let mut response = json!({
            "id": "ch_1",
            "currency": "eur",
            "total_amount": 1000,
            "total_display_amount": "\u{20ac}10.00"
        });
        routes.dispatch("/shop/v1/checkouts/ch_1", &mut response);
        assert_eq!(response["total_display_amount"], "\u{20ac}10.00 (BGN 19.56)");
    }

    #[test]
    fn test_route_dispatch_handles_collections() {
        let (_, routes) = registries();
        let mut response = json!({
            "data": [
                {"id": "ch_1", "currency": "eur",
                 "total_amount": 1000, "total_display_amount": "\u{20ac}10.00"},
                {"id": "ch_2", "currency": "usd",
                 "total_amount": 1000, "total_display_amount": "$10.00"}
            ]
        });
        routes.dispatch("/shop/v1/checkouts", &mut response);
        assert_eq!(response["data"][0]["total_display_amount"], "\u{20ac}10.00 (BGN 19.56)");
        assert_eq!(response["data"][1]["total_display_amount"], "$10.00");
    }

    #[test]
    fn test_unrecognized_route_passes_through() {
        let (_, routes) = registries();
        let mut response = json!({
            "currency": "eur",
            "total_amount": 1000,
            "total_display_amount": "\u{20ac}10.00"
        });
        let before = response.clone();
        routes.dispatch("/shop/v1/products/pr_1", &mut response);
        assert_eq!(response, before);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let (mut blocks, mut routes) = registries();
        let err = blocks
            .register(SELECTED_PRICE_BLOCK, Box::new(|fragment, _| fragment.to_string()))
            .unwrap_err();
        assert!(matches!(err, HooksError::DuplicateBlock(_)));
        let err = routes.register(CHECKOUTS_ROUTE, Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, HooksError::DuplicateRoute(_)));
    }
}
