//! Top-K selection shared by both aggregators so they rank identically.

use std::cmp::Ordering;

use crate::types::{FacetCount, FacetRequest, FacetResult};

/// Count descending, then label ascending (byte order).
pub fn compare_entries(a: (&str, u64), b: (&str, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Ranks `(label, count)` tallies according to `request`.
///
/// Zero counts are dropped unless the request includes them. Labels must be
/// unique in `tallies`.
pub fn rank<I>(tallies: I, request: &FacetRequest) -> FacetResult
where
    I: IntoIterator<Item = (String, u64)>,
{
    let mut entries: Vec<(String, u64)> = tallies
        .into_iter()
        .filter(|(_, count)| request.include_zero_counts || *count > 0)
        .collect();
    let k = request.top_k.min(entries.len());
    let cmp = |a: &(String, u64), b: &(String, u64)| compare_entries((&a.0, a.1), (&b.0, b.1));
    if k > 0 && k < entries.len() {
        entries.select_nth_unstable_by(k - 1, cmp);
    }
    entries.truncate(k);
    entries.sort_unstable_by(cmp);
    FacetResult {
        dimension: request.dimension.clone(),
        counts: entries.into_iter().map(|(label, count)| FacetCount { label, count }).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tallies(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
        pairs.iter().map(|(l, c)| (l.to_string(), *c)).collect()
    }

    #[test]
    fn ties_break_on_label_and_truncate() {
        let request = FacetRequest::new("authors", 2);
        let result = rank(tallies(&[("Z", 3), ("Y", 5), ("X", 5)]), &request);
        assert_eq!(result.pairs(), vec![("X", 5), ("Y", 5)]);
    }

    #[test]
    fn zero_counts_follow_the_request() {
        let data = tallies(&[("a", 0), ("b", 2)]);
        let excluded = rank(data.clone(), &FacetRequest::new("d", 10));
        assert_eq!(excluded.pairs(), vec![("b", 2)]);

        let included = rank(data, &FacetRequest::new("d", 10).with_zero_counts(true));
        assert_eq!(included.pairs(), vec![("b", 2), ("a", 0)]);
    }

    #[test]
    fn k_larger_than_label_count_returns_everything_sorted() {
        let result = rank(tallies(&[("b", 1), ("a", 1), ("c", 4)]), &FacetRequest::new("d", 50));
        assert_eq!(result.pairs(), vec![("c", 4), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn byte_order_tie_break() {
        // uppercase sorts before lowercase in byte order
        let result = rank(tallies(&[("alice", 1), ("Bob", 1)]), &FacetRequest::new("d", 2));
        assert_eq!(result.pairs(), vec![("Bob", 1), ("alice", 1)]);
    }
}
