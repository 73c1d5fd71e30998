use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use facetbench_core::config::{BenchConfig, Config};
use facetbench_core::source::{JsonRecordSource, SyntheticSource};
use facetbench_core::traits::RecordSource;
use facetbench_core::types::Book;
use facetbench_core::{FacetRequest, FacetResult, Predicate, Strategy};
use facetbench_harness::{BenchmarkDriver, BenchmarkReport, BuildState, Preparation, StrategyOutcome};

#[derive(Parser)]
#[command(name = "facetbench")]
#[command(about = "Compare embedded-category and columnar-ordinal facet counting", long_about = None)]
struct Cli {
    /// Directory holding config.toml; relative paths resolve against it.
    /// Defaults to the current directory
    #[arg(long)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether both indexes exist
    Status,
    /// Build both indexes unless they already exist
    Build {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print top-K facet counts from one or both strategies
    Facets {
        #[arg(long, value_enum, default_value_t = StrategyArg::Both)]
        strategy: StrategyArg,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Build if needed, check both strategies agree, then time them
    Bench {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        request: RequestArgs,
        /// Emit the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Book records (JSON/JSONL file or directory); defaults to data.records
    #[arg(long)]
    records: Option<PathBuf>,
    /// Generate this many synthetic books instead of reading records
    #[arg(long, conflicts_with = "records")]
    synthetic: Option<u64>,
    /// Distinct authors in the synthetic corpus
    #[arg(long, default_value_t = 1_000)]
    authors: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args)]
struct RequestArgs {
    /// Query string run through the query parser; matches everything if absent
    #[arg(long)]
    query: Option<String>,
    /// Exact-term filter, FIELD=VALUE; repeatable
    #[arg(long = "term", value_parser = parse_term)]
    terms: Vec<(String, String)>,
    /// Facet dimension; defaults to facets.request.dimension
    #[arg(long)]
    dimension: Option<String>,
    #[arg(long, short = 'k')]
    top_k: Option<usize>,
    /// Also report labels with a zero count
    #[arg(long, default_value_t = false)]
    zero_counts: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    EmbeddedCategory,
    ColumnarOrdinal,
    Both,
}

impl StrategyArg {
    fn strategies(self) -> Vec<Strategy> {
        match self {
            StrategyArg::EmbeddedCategory => vec![Strategy::EmbeddedCategory],
            StrategyArg::ColumnarOrdinal => vec![Strategy::ColumnarOrdinal],
            StrategyArg::Both => Strategy::ALL.to_vec(),
        }
    }
}

fn parse_term(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field.to_string(), value.to_string())),
        _ => Err(format!("expected FIELD=VALUE, got '{raw}'")),
    }
}

impl RequestArgs {
    fn predicate(&self) -> Predicate {
        let mut parts: Vec<Predicate> = self
            .terms
            .iter()
            .map(|(field, value)| Predicate::Term { field: field.clone(), value: value.clone() })
            .collect();
        if let Some(q) = self.query.as_deref().filter(|q| !q.trim().is_empty()) {
            parts.push(Predicate::Parsed(q.to_string()));
        }
        match parts.len() {
            0 => Predicate::MatchAll,
            1 => parts.remove(0),
            _ => Predicate::All(parts),
        }
    }

    fn request(&self, config: &BenchConfig) -> FacetRequest {
        let defaults = &config.facets.request;
        FacetRequest::new(self.dimension.clone().unwrap_or_else(|| defaults.dimension.clone()), self.top_k.unwrap_or(defaults.top_k))
            .with_zero_counts(self.zero_counts || defaults.include_zero_counts)
    }
}

impl SourceArgs {
    fn open(&self, config: &BenchConfig) -> facetbench_core::Result<Box<dyn RecordSource>> {
        if let Some(total) = self.synthetic {
            tracing::info!(total, authors = self.authors, seed = self.seed, "using synthetic records");
            return Ok(Box::new(SyntheticSource::new(total, self.authors, self.seed)));
        }
        let path = self.records.clone().unwrap_or_else(|| PathBuf::from(&config.data.records));
        tracing::info!(path = %path.display(), "reading records");
        Ok(Box::new(JsonRecordSource::open(&path)?))
    }
}

/// Opens the records only once a build pulls the first batch, so existing
/// indexes can be reused without them.
struct DeferredSource<'a> {
    args: &'a SourceArgs,
    config: &'a BenchConfig,
    inner: Option<Box<dyn RecordSource>>,
}

impl RecordSource for DeferredSource<'_> {
    fn next_batch(&mut self, max: usize) -> facetbench_core::Result<Option<Vec<Book>>> {
        if self.inner.is_none() {
            self.inner = Some(self.args.open(self.config)?);
        }
        match self.inner.as_mut() {
            Some(inner) => inner.next_batch(max),
            None => Ok(None),
        }
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let loaded = match &cli.config_dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    };
    let config = loaded
        .and_then(|c| c.bench())
        .context("loading configuration")?;
    let driver = BenchmarkDriver::new(config.clone())?.with_progress(true);

    match cli.command {
        Commands::Status => {
            let state = driver.state();
            println!("state:    {}", match state {
                BuildState::Ready => "ready",
                BuildState::NeedsBuild => "needs build",
            });
            println!("embedded: {}", driver.paths().embedded.display());
            println!("columnar: {}", driver.paths().columnar.display());
        }
        Commands::Build { source } => prepare(&driver, &source, &config)?,
        Commands::Facets { strategy, request } => {
            if driver.state() != BuildState::Ready {
                bail!("indexes are missing; run `facetbench build` first");
            }
            let predicate = request.predicate();
            let facet_request = request.request(&config);
            for s in strategy.strategies() {
                let result = driver.facets(s, &predicate, &facet_request)?;
                print_result(s, &result);
            }
        }
        Commands::Bench { source, request, json } => {
            prepare(&driver, &source, &config)?;
            let report = driver.run(&request.predicate(), &request.request(&config))?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}

fn prepare(driver: &BenchmarkDriver, source: &SourceArgs, config: &BenchConfig) -> Result<()> {
    let mut records = DeferredSource { args: source, config, inner: None };
    match driver.prepare(&mut records)? {
        Preparation::Built(summary) => eprintln!(
            "built both indexes: {} records, {} batches, {} commits in {} ms",
            summary.records, summary.batches, summary.commits, summary.elapsed_millis
        ),
        Preparation::AlreadyBuilt => eprintln!("indexes already built"),
    }
    Ok(())
}

fn print_result(strategy: Strategy, result: &FacetResult) {
    println!("{strategy} / {}", result.dimension);
    if result.counts.is_empty() {
        println!("  (no labels)");
    }
    for (rank, c) in result.counts.iter().enumerate() {
        println!("  {:>3}. {:<40} {}", rank + 1, c.label, c.count);
    }
}

fn print_report(report: &BenchmarkReport) {
    println!(
        "dimension {} | top {} | {} thread(s) | equivalent: {}",
        report.dimension, report.top_k, report.threads, report.equivalent
    );
    for entry in &report.strategies {
        match &entry.outcome {
            StrategyOutcome::Measured { counts, latency } => {
                println!(
                    "{:<18} {} calls  min {} us  avg {:.1} us  max {} us",
                    entry.strategy.name(),
                    latency.iterations,
                    latency.min_micros,
                    latency.avg_micros,
                    latency.max_micros
                );
                for c in counts {
                    println!("    {:<40} {}", c.label, c.count);
                }
            }
            StrategyOutcome::Failed { error } => println!("{:<18} FAILED: {error}", entry.strategy.name()),
        }
    }
}
