//! Retrieval strategies.
//!
//! A strategy is one way of asking one upstream source: it turns a logical
//! query into a [`FetchRequest`](crate::core::FetchRequest) and a response
//! body into identifiers. [`TemplateStrategy`] covers the URL-template case;
//! [`search_strategies`] and [`detail_strategies`] are the built-in catalogs.

pub mod catalog;
mod template;

pub use catalog::{detail_strategies, search_strategies};
pub use template::{SchemeKind, StrategyDefinition, TemplateStrategy};
