//! Construction of both indexes from one pass over a record source.
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use facetbench_core::config::{CommitPolicy, IndexingConfig};
use facetbench_core::mapping::BookMapper;
use facetbench_core::traits::{FacetIndexWriter, RecordSource};
use facetbench_core::{Error, IndexLayout, Result, Strategy};
use facetbench_text::open_writer;

use crate::state::IndexPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub records: u64,
    pub batches: u64,
    pub commits: u64,
    pub elapsed_millis: u64,
}

/// Streams `source` into both writers, committing per `indexing.commit_policy`,
/// then promotes the staging directories to `paths`.
///
/// On error nothing is promoted: the final paths stay as they were and the
/// staging directories are left behind for inspection.
pub fn build_indexes(
    source: &mut dyn RecordSource,
    paths: &IndexPaths,
    layout: &IndexLayout,
    mapper: &BookMapper,
    indexing: &IndexingConfig,
    show_progress: bool,
) -> Result<BuildSummary> {
    if indexing.batch_size == 0 {
        return Err(Error::Configuration("indexing.batch_size must be greater than zero".into()));
    }
    let started = Instant::now();
    for strategy in Strategy::ALL {
        remove_stale(&paths.staging(strategy))?;
    }
    let mut writers = Strategy::ALL
        .iter()
        .map(|s| open_writer(*s, &paths.staging(*s), layout, indexing.writer_memory_bytes))
        .collect::<Result<Vec<_>>>()?;

    let pb = if show_progress { ProgressBar::new_spinner() } else { ProgressBar::hidden() };
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} records {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let mut summary = BuildSummary { records: 0, batches: 0, commits: 0, elapsed_millis: 0 };
    while let Some(batch) = source.next_batch(indexing.batch_size)? {
        if batch.is_empty() {
            continue;
        }
        for book in &batch {
            let doc = mapper.to_document(book);
            layout.validate_document(&doc)?;
            for writer in &mut writers {
                writer.add_document(&doc)?;
            }
            summary.records += 1;
            if indexing.commit_policy == CommitPolicy::PerDocument {
                commit_all(&mut writers)?;
                summary.commits += 1;
            }
        }
        if indexing.commit_policy == CommitPolicy::PerBatch {
            commit_all(&mut writers)?;
            summary.commits += 1;
        }
        summary.batches += 1;
        pb.set_position(summary.records);
        pb.set_message(format!("batch {}", summary.batches));
        tracing::debug!(batch = summary.batches, records = summary.records, "batch indexed");
    }

    pb.set_message("finalising");
    for writer in &mut writers {
        writer.finish()?;
    }
    // both writers must release their directory locks before the move
    drop(writers);
    for strategy in Strategy::ALL {
        promote(&paths.staging(strategy), paths.for_strategy(strategy))?;
    }
    pb.finish_with_message("done");

    summary.elapsed_millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        records = summary.records,
        batches = summary.batches,
        commits = summary.commits,
        elapsed_ms = summary.elapsed_millis,
        "built both indexes"
    );
    Ok(summary)
}

fn commit_all(writers: &mut [Box<dyn FacetIndexWriter>]) -> Result<()> {
    for writer in writers.iter_mut() {
        writer.commit()?;
    }
    Ok(())
}

fn remove_stale(staging: &Path) -> Result<()> {
    if staging.exists() {
        tracing::warn!(path = %staging.display(), "removing stale staging directory");
        fs::remove_dir_all(staging).map_err(|e| Error::storage(format!("removing {}", staging.display()), e))?;
    }
    Ok(())
}

/// Moves a finished staging directory to its final path. A lone final
/// directory left by an earlier partial run is replaced.
fn promote(staging: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        tracing::warn!(path = %target.display(), "replacing index without its counterpart");
        fs::remove_dir_all(target).map_err(|e| Error::storage(format!("removing {}", target.display()), e))?;
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(staging, target).map_err(|e| Error::storage(format!("moving {} into place", staging.display()), e))?;
    tracing::debug!(from = %staging.display(), to = %target.display(), "promoted staging directory");
    Ok(())
}
