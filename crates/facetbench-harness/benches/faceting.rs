use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

use facetbench_core::config::BenchConfig;
use facetbench_core::source::SyntheticSource;
use facetbench_core::{FacetRequest, Predicate, Strategy};
use facetbench_harness::BenchmarkDriver;

fn bench_top_k(c: &mut Criterion) {
    let tmp = TempDir::new().expect("temp dir");
    let mut config = BenchConfig::default();
    config.data.embedded_index_dir = tmp.path().join("embedded").display().to_string();
    config.data.columnar_index_dir = tmp.path().join("columnar").display().to_string();
    config.indexing.batch_size = 500;
    let driver = BenchmarkDriver::new(config).expect("driver");
    driver.prepare(&mut SyntheticSource::new(20_000, 2_000, 42)).expect("build");

    let predicates = [
        ("all", Predicate::MatchAll),
        ("publisher", Predicate::Term { field: "publisher".into(), value: "Publisher 3".into() }),
    ];
    let mut group = c.benchmark_group("facet_top_k");
    for strategy in Strategy::ALL {
        let aggregator = driver.open(strategy).expect("open");
        for (name, predicate) in &predicates {
            for k in [10, 100] {
                let request = FacetRequest::new("authors", k);
                group.bench_with_input(BenchmarkId::new(format!("{strategy}/{name}"), k), &request, |b, request| {
                    b.iter(|| black_box(aggregator.top_k(predicate, request).expect("top_k")))
                });
            }
        }
    }
    group.finish();
}

criterion_group!(benches, bench_top_k);
criterion_main!(benches);
