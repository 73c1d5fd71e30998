//! facetbench-text
//!
//! Tantivy-backed implementations of both facet strategies: writers in
//! `index`, aggregators in `search`, and the shared schema utilities.
pub mod collector;
pub mod index;
pub mod query;
pub mod search;
pub mod tantivy_utils;

pub use index::{open_writer, ColumnarOrdinalWriter, EmbeddedCategoryWriter};
pub use search::{open_aggregator, ColumnarOrdinalAggregator, EmbeddedCategoryAggregator};
