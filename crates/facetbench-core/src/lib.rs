//! facetbench-core
//!
//! Domain types, document mapping, record sources, configuration and the
//! writer/aggregator capability traits shared by both facet strategies.

pub mod config;
pub mod error;
pub mod mapping;
pub mod ranking;
pub mod source;
pub mod traits;
pub mod types;

pub use error::{Divergence, Error, Result};
pub use types::{Document, FacetCount, FacetRequest, FacetResult, IndexLayout, Predicate, Strategy};
