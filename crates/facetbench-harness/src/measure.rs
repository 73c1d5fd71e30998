//! Latency measurement of one aggregator across concurrent workers.
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use facetbench_core::config::HarnessConfig;
use facetbench_core::traits::FacetAggregator;
use facetbench_core::{Error, FacetRequest, FacetResult, Predicate, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub iterations: usize,
    pub min_micros: u64,
    pub avg_micros: f64,
    pub max_micros: u64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        let micros = |d: &Duration| u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        let min = samples.iter().map(micros).min()?;
        let max = samples.iter().map(micros).max()?;
        let total: f64 = samples.iter().map(|d| d.as_secs_f64() * 1e6).sum();
        Some(Self { iterations: samples.len(), min_micros: min, avg_micros: total / samples.len() as f64, max_micros: max })
    }
}

/// Runs `settings.threads` workers, each over its own aggregator from `open`:
/// `warmup_iterations` untimed calls, then `measurement_iterations` timed ones.
/// Returns the result observed by the first worker and stats over all samples.
pub fn measure<F>(
    open: F,
    predicate: &Predicate,
    request: &FacetRequest,
    settings: &HarnessConfig,
) -> Result<(FacetResult, LatencyStats)>
where
    F: Fn() -> Result<Box<dyn FacetAggregator>> + Sync,
{
    let threads = settings.threads.max(1);
    let worker = || -> Result<(FacetResult, Vec<Duration>)> {
        let aggregator = open()?;
        for _ in 0..settings.warmup_iterations {
            aggregator.top_k(predicate, request)?;
        }
        let mut last = None;
        let mut samples = Vec::with_capacity(settings.measurement_iterations);
        for _ in 0..settings.measurement_iterations {
            let started = Instant::now();
            last = Some(aggregator.top_k(predicate, request)?);
            samples.push(started.elapsed());
        }
        let result = match last {
            Some(result) => result,
            None => aggregator.top_k(predicate, request)?,
        };
        Ok((result, samples))
    };

    let outcomes: Vec<Result<(FacetResult, Vec<Duration>)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads).map(|_| scope.spawn(&worker)).collect();
        handles.into_iter().map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))).collect()
    });

    let mut first = None;
    let mut samples = Vec::with_capacity(threads * settings.measurement_iterations);
    for outcome in outcomes {
        let (result, mut worker_samples) = outcome?;
        samples.append(&mut worker_samples);
        first.get_or_insert(result);
    }
    let stats = LatencyStats::from_samples(&samples).unwrap_or(LatencyStats {
        iterations: 0,
        min_micros: 0,
        avg_micros: 0.0,
        max_micros: 0,
    });
    let result = first.ok_or_else(|| Error::Configuration("no measurement worker ran".into()))?;
    Ok((result, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_cover_all_samples() {
        let samples = [Duration::from_micros(10), Duration::from_micros(30), Duration::from_micros(20)];
        let stats = LatencyStats::from_samples(&samples).unwrap();
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.min_micros, 10);
        assert_eq!(stats.max_micros, 30);
        assert!((stats.avg_micros - 20.0).abs() < 1e-6);
    }

    #[test]
    fn no_samples_no_stats() {
        assert!(LatencyStats::from_samples(&[]).is_none());
    }
}
