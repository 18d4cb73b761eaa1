//! Fixed-rate conversion between the primary and secondary currency
//!
//! Amounts are integer minor units throughout; the only non-integer value in
//! the whole engine is the conversion rate itself, held as a `Decimal` so the
//! arithmetic stays exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Renders a minor-units amount as a locale display string.
///
/// Formatting proper is an external concern; the engine only needs this one
/// seam. [`FixedLocaleFormatter`] is the provided implementation for the
/// fixed locale pairing.
pub trait CurrencyFormatter {
    /// Format `amount_minor_units` as a major-unit display string.
    fn format(&self, amount_minor_units: i64) -> String;
}

/// Where the currency symbol sits relative to the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolPlacement {
    /// Symbol before the number
    Prefix,
    /// Symbol after the number
    Suffix,
}

/// Formatter for the one fixed locale pairing.
#[derive(Debug, Clone)]
pub struct FixedLocaleFormatter {
    symbol: String,
    placement: SymbolPlacement,
    decimal_comma: bool,
    precision: u32,
}

impl FixedLocaleFormatter {
    /// Create a formatter with two-digit precision and a period decimal point.
    pub fn new(symbol: impl Into<String>, placement: SymbolPlacement) -> Self {
        Self { symbol: symbol.into(), placement, decimal_comma: false, precision: 2 }
    }

    /// Use a comma as the decimal separator.
    pub fn with_decimal_comma(mut self, comma: bool) -> Self {
        self.decimal_comma = comma;
        self
    }

    /// Override the display precision.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }
}

impl CurrencyFormatter for FixedLocaleFormatter {
    fn format(&self, amount_minor_units: i64) -> String {
        let major = Decimal::new(amount_minor_units, 2)
            .round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero);
        let mut number = format!("{:.*}", self.precision as usize, major);
        if self.decimal_comma {
            number = number.replace('.', ",");
        }
        match self.placement {
            // Alphabetic symbols ("BGN") read with a space, glyphs ("€") without.
            SymbolPlacement::Prefix if self.symbol.chars().all(|c| c.is_alphabetic()) => {
                format!("{} {}", self.symbol, number)
            }
            SymbolPlacement::Prefix => format!("{}{}", self.symbol, number),
            SymbolPlacement::Suffix => format!("{} {}", number, self.symbol),
        }
    }
}

/// Converts primary-currency minor units into secondary-currency minor units.
#[derive(Debug, Clone)]
pub struct Converter {
    rate: Decimal,
}

impl Converter {
    /// Create a converter with the given fixed rate.
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }

    /// The fixed rate this converter applies.
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// Convert minor units, rounding half away from zero.
    pub fn convert(&self, amount_minor_units: i64) -> i64 {
        let product = Decimal::from(amount_minor_units) * self.rate;
        product
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX) // saturate on out-of-range products
    }

    /// The formatted secondary display for an amount, or `None` when there is
    /// nothing to annotate (zero or negative input).
    pub fn secondary_display(
        &self,
        amount_minor_units: i64,
        formatter: &dyn CurrencyFormatter,
    ) -> Option<String> {
        if amount_minor_units <= 0 {
            return None;
        }
        Some(formatter.format(self.convert(amount_minor_units)))
    }
}
