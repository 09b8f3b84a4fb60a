//! Identifier extraction from heterogeneous response bodies.
//!
//! Recognition is declarative: an [`IdentifierScheme`] is a table of
//! case-insensitive patterns plus a [`MatchRule`] that validates and
//! normalizes their captures. An [`Extractor`] applies schemes to text.

mod extractor;
mod scheme;

pub use extractor::Extractor;
pub use scheme::{IdentifierScheme, MatchRule, SchemeDefinition};
