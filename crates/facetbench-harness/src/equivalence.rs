use facetbench_core::{Divergence, Error, FacetResult, Result};

/// Every rank at which the two results differ in label or count.
pub fn compare_results(embedded: &FacetResult, columnar: &FacetResult) -> Vec<Divergence> {
    let entry = |r: &FacetResult, i: usize| r.counts.get(i).map(|c| (c.label.clone(), c.count));
    let len = embedded.counts.len().max(columnar.counts.len());
    (0..len)
        .filter_map(|rank| {
            let (a, b) = (entry(embedded, rank), entry(columnar, rank));
            (a != b).then_some(Divergence { rank, embedded: a, columnar: b })
        })
        .collect()
}

pub fn verify_equivalence(embedded: &FacetResult, columnar: &FacetResult) -> Result<()> {
    let divergences = compare_results(embedded, columnar);
    if divergences.is_empty() {
        tracing::debug!(dimension = %embedded.dimension, entries = embedded.counts.len(), "strategies agree");
        return Ok(());
    }
    tracing::error!(dimension = %embedded.dimension, mismatches = divergences.len(), "strategies disagree");
    Err(Error::EquivalenceViolation { dimension: embedded.dimension.clone(), divergences })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetbench_core::FacetCount;

    fn result(pairs: &[(&str, u64)]) -> FacetResult {
        FacetResult {
            dimension: "authors".into(),
            counts: pairs.iter().map(|(l, c)| FacetCount { label: l.to_string(), count: *c }).collect(),
        }
    }

    #[test]
    fn identical_results_pass() {
        let r = result(&[("Alice", 2), ("Bob", 1)]);
        assert!(verify_equivalence(&r, &r.clone()).is_ok());
    }

    #[test]
    fn every_mismatch_is_listed() {
        let a = result(&[("Alice", 2), ("Bob", 1), ("Carol", 1)]);
        let b = result(&[("Alice", 2), ("Bob", 2)]);
        let divergences = compare_results(&a, &b);
        assert_eq!(
            divergences,
            vec![
                Divergence { rank: 1, embedded: Some(("Bob".into(), 1)), columnar: Some(("Bob".into(), 2)) },
                Divergence { rank: 2, embedded: Some(("Carol".into(), 1)), columnar: None },
            ]
        );
        let message = verify_equivalence(&a, &b).unwrap_err().to_string();
        assert!(message.contains("authors"), "{message}");
        assert!(message.contains("<missing>"), "{message}");
    }
}
