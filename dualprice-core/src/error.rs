//! Error types and the skip taxonomy
//!
//! Hard errors exist only at construction time (bad configuration, duplicate
//! handler registration). Everything that can go wrong during an annotation
//! pass is a *skip*, not an error: the pass leaves the value untouched and
//! moves on, so a broken price annotation can never break checkout rendering.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while building or validating a [`crate::config::PricingConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The fixed conversion rate must be a positive number
    #[error("conversion rate must be positive, got {0}")]
    NonPositiveRate(Decimal),
    /// A currency code was empty
    #[error("currency codes must not be empty")]
    EmptyCurrencyCode,
    /// The marker CSS class was empty
    #[error("marker class must not be empty")]
    EmptyMarkerClass,
    /// The configuration document could not be parsed
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while registering hook handlers
#[derive(Debug, Error)]
pub enum HooksError {
    /// A handler is already registered for this block identifier
    #[error("a handler is already registered for block {0:?}")]
    DuplicateBlock(String),
    /// A handler is already registered for this route prefix
    #[error("a handler is already registered for route prefix {0:?}")]
    DuplicateRoute(String),
}

/// Reasons an annotation pass leaves something untouched.
///
/// These are expected outcomes, not failures; they are logged at debug/trace
/// level and never propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Currency mismatch or empty/zero amount
    NotApplicable,
    /// Text did not match any recognized price pattern
    ParseFailure,
    /// Expected wrapper or closing tag not found during injection
    StructuralMismatch,
    /// The checkout root never appeared within the polling budget
    BootstrapTimeout,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkipReason::NotApplicable => "not applicable",
            SkipReason::ParseFailure => "no price pattern recognized",
            SkipReason::StructuralMismatch => "markup structure mismatch",
            SkipReason::BootstrapTimeout => "checkout root never appeared",
        };
        write!(f, "{}", name)
    }
}
