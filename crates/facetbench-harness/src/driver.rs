use serde::Serialize;

use facetbench_core::config::BenchConfig;
use facetbench_core::mapping::BookMapper;
use facetbench_core::traits::{FacetAggregator, RecordSource};
use facetbench_core::types::FacetCount;
use facetbench_core::{Error, FacetRequest, FacetResult, IndexLayout, Predicate, Result, Strategy};
use facetbench_text::open_aggregator;

use crate::build::{build_indexes, BuildSummary};
use crate::equivalence::verify_equivalence;
use crate::measure::{measure, LatencyStats};
use crate::state::{BuildState, IndexPaths};

/// What `prepare` had to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Preparation {
    Built(BuildSummary),
    AlreadyBuilt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StrategyOutcome {
    Measured { counts: Vec<FacetCount>, latency: LatencyStats },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    pub strategy: Strategy,
    #[serde(flatten)]
    pub outcome: StrategyOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub dimension: String,
    pub top_k: usize,
    pub threads: usize,
    pub equivalent: bool,
    pub strategies: Vec<StrategyReport>,
}

impl BenchmarkReport {
    pub fn strategy(&self, strategy: Strategy) -> Option<&StrategyReport> {
        self.strategies.iter().find(|r| r.strategy == strategy)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Configuration(format!("serializing the report: {e}")))
    }
}

/// Owns the build state machine and runs the comparison once both indexes
/// exist.
pub struct BenchmarkDriver {
    config: BenchConfig,
    layout: IndexLayout,
    mapper: BookMapper,
    paths: IndexPaths,
    show_progress: bool,
}

impl BenchmarkDriver {
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        let mapper = config.mapper();
        let layout = config.layout();
        let paths = IndexPaths::from_config(&config.data);
        Ok(Self { config, layout, mapper, paths, show_progress: false })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &BenchConfig { &self.config }

    pub fn layout(&self) -> &IndexLayout { &self.layout }

    pub fn paths(&self) -> &IndexPaths { &self.paths }

    pub fn state(&self) -> BuildState { BuildState::detect(&self.paths) }

    /// Builds both indexes from `source` unless both already exist. Existing
    /// indexes are reused as they are, even if the records changed since.
    pub fn prepare(&self, source: &mut dyn RecordSource) -> Result<Preparation> {
        if self.state() == BuildState::Ready {
            tracing::info!(embedded = %self.paths.embedded.display(), columnar = %self.paths.columnar.display(), "indexes present, skipping build");
            return Ok(Preparation::AlreadyBuilt);
        }
        let summary = build_indexes(source, &self.paths, &self.layout, &self.mapper, &self.config.indexing, self.show_progress)?;
        Ok(Preparation::Built(summary))
    }

    pub fn open(&self, strategy: Strategy) -> Result<Box<dyn FacetAggregator>> {
        if self.state() != BuildState::Ready {
            return Err(Error::Configuration("indexes are not built yet; run a build first".into()));
        }
        open_aggregator(strategy, self.paths.for_strategy(strategy), &self.layout)
    }

    pub fn facets(&self, strategy: Strategy, predicate: &Predicate, request: &FacetRequest) -> Result<FacetResult> {
        self.open(strategy)?.top_k(predicate, request)
    }

    /// Runs both strategies once and fails on any divergence.
    pub fn verify(&self, predicate: &Predicate, request: &FacetRequest) -> Result<FacetResult> {
        let embedded = self.facets(Strategy::EmbeddedCategory, predicate, request)?;
        let columnar = self.facets(Strategy::ColumnarOrdinal, predicate, request)?;
        verify_equivalence(&embedded, &columnar)?;
        Ok(embedded)
    }

    /// Checks equivalence, then times each strategy. A strategy that fails to
    /// answer is reported without stopping the other; disagreement between two
    /// answers aborts the run.
    pub fn run(&self, predicate: &Predicate, request: &FacetRequest) -> Result<BenchmarkReport> {
        if self.state() != BuildState::Ready {
            return Err(Error::Configuration("indexes are not built yet; run a build first".into()));
        }
        let embedded = self.facets(Strategy::EmbeddedCategory, predicate, request);
        let columnar = self.facets(Strategy::ColumnarOrdinal, predicate, request);
        let equivalent = match (&embedded, &columnar) {
            (Ok(a), Ok(b)) => {
                verify_equivalence(a, b)?;
                true
            }
            _ => false,
        };

        let settings = &self.config.harness;
        let mut strategies = Vec::with_capacity(Strategy::ALL.len());
        for (strategy, first) in [(Strategy::EmbeddedCategory, embedded), (Strategy::ColumnarOrdinal, columnar)] {
            let outcome = match first.and_then(|_| measure(|| self.open(strategy), predicate, request, settings)) {
                Ok((result, latency)) => {
                    tracing::info!(%strategy, avg_us = latency.avg_micros, min_us = latency.min_micros, max_us = latency.max_micros, "measured");
                    StrategyOutcome::Measured { counts: result.counts, latency }
                }
                Err(e) => {
                    tracing::warn!(%strategy, error = %e, "strategy failed");
                    StrategyOutcome::Failed { error: e.to_string() }
                }
            };
            strategies.push(StrategyReport { strategy, outcome });
        }
        Ok(BenchmarkReport {
            dimension: request.dimension.clone(),
            top_k: request.top_k,
            threads: settings.threads,
            equivalent,
            strategies,
        })
    }
}
