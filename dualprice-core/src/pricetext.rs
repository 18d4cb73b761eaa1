//! Extraction of primary-currency amounts from rendered price text
//!
//! The client agent only ever sees rendered text, not the numeric model
//! behind it, so amounts are recovered from loosely-formatted strings:
//! symbol-prefixed ("€10"), symbol-suffixed ("10,00 €"), or code-prefixed
//! ("EUR 10.00"). Absence of a match is a normal outcome, not an error;
//! most text nodes are not prices.

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parses price text into primary-currency minor units.
#[derive(Debug, Clone)]
pub struct PriceTextParser {
    strip_secondary: Regex,
    pattern: Regex,
}

impl PriceTextParser {
    /// Build a parser for the given primary symbol/code and secondary marker.
    ///
    /// Any text already appended by a previous annotation pass (identified by
    /// the secondary marker) is stripped before matching, so re-scans never
    /// mis-parse their own prior output as a primary amount.
    pub fn new(primary_symbol: &str, primary_code: &str, secondary_marker: &str) -> Self {
        let strip_secondary =
            Regex::new(&format!(r"(?i){}[\s\d.,]+", regex::escape(secondary_marker))).unwrap();
        let symbol = regex::escape(primary_symbol);
        let code = regex::escape(primary_code);
        let pattern = Regex::new(&format!(
            r"{symbol}\s*([0-9][0-9.,]*)|([0-9][0-9.,]*)\s*{symbol}|(?i:{code})\s*([0-9][0-9.,]*)"
        ))
        .unwrap();
        Self { strip_secondary, pattern }
    }

    /// Extract an amount in minor units, or `None` when the text holds no
    /// recognizable primary-currency price.
    pub fn parse(&self, text: &str) -> Option<i64> {
        let cleaned = self.strip_secondary.replace_all(text, "");
        let captures = self.pattern.captures(cleaned.trim())?;
        let raw = captures
            .get(1)
            .or_else(|| captures.get(2))
            .or_else(|| captures.get(3))?
            .as_str()
            .trim_end_matches(&['.', ','][..]);
        let normalized = raw.replace(',', ".");
        let amount = Decimal::from_str(&normalized).ok()?;
        (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }
}

impl Default for PriceTextParser {
    fn default() -> Self {
        Self::new("\u{20ac}", "EUR", "BGN")
    }
}
