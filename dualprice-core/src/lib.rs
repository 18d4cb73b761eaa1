//! Dual-currency annotation engine
//!
//! Annotates every shopper-facing price with a fixed-rate secondary-currency
//! value, consistently across three surfaces: server-rendered markup
//! fragments, JSON API payloads, and a reactive client-side DOM agent that
//! pierces shadow boundaries. The shared invariant is that a price is
//! annotated exactly once, no matter how many times a pass runs or how many
//! paths reach the same monetary field.

#![warn(clippy::all)]
#![warn(missing_docs)]

/// Module for engine configuration and the client rate injection
pub mod config;

/// Module for fixed-rate conversion and display formatting
pub mod convert;

/// Module for the abstract DOM tree and the client annotation agent
pub mod dom;

/// Module for error types and the skip taxonomy
pub mod error;

/// Module for block-render and REST-route registration tables
pub mod hooks;

/// Module for depth-aware markup injection
pub mod markup;

/// Module for typed priced entities
pub mod model;

/// Module for recursive JSON payload annotation
pub mod payload;

/// Module for price text extraction
pub mod pricetext;
