//! facetbench-harness
//!
//! Drives the comparison: detects whether the index pair exists, builds both
//! indexes in one pass, checks that the strategies agree and times them.
pub mod build;
pub mod driver;
pub mod equivalence;
pub mod measure;
pub mod state;

pub use build::{build_indexes, BuildSummary};
pub use driver::{BenchmarkDriver, BenchmarkReport, Preparation, StrategyOutcome, StrategyReport};
pub use equivalence::{compare_results, verify_equivalence};
pub use measure::{measure, LatencyStats};
pub use state::{BuildState, IndexPaths};
