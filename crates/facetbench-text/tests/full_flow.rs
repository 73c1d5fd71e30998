use std::path::{Path, PathBuf};

use tempfile::TempDir;

use facetbench_core::mapping::BookMapper;
use facetbench_core::source::SyntheticSource;
use facetbench_core::traits::{FacetAggregator, FacetIndexWriter, RecordSource};
use facetbench_core::types::{Author, Book, DimensionSpec, Document};
use facetbench_core::{Error, FacetRequest, IndexLayout, Predicate};
use facetbench_text::{ColumnarOrdinalAggregator, ColumnarOrdinalWriter, EmbeddedCategoryAggregator, EmbeddedCategoryWriter};

const MEMORY: usize = 20_000_000;

fn layout() -> IndexLayout {
    BookMapper::default().layout(vec![
        DimensionSpec { name: "authors".into(), multi_valued: true },
        DimensionSpec { name: "imprint".into(), multi_valued: false },
    ])
}

fn book(id: u64, title: &str, authors: &[&str]) -> Book {
    Book {
        id,
        isbn: format!("isbn-{id}"),
        title: title.to_string(),
        publisher: "Acme".to_string(),
        authors: authors.iter().map(|n| Author { id: n.to_string(), name: n.to_string() }).collect(),
    }
}

fn scenario_books() -> Vec<Book> {
    vec![book(1, "B1", &["Alice", "Bob"]), book(2, "B2", &["Alice"]), book(3, "B3", &["Carol"])]
}

/// Builds both indexes under `dir`, committing every `batch` documents.
fn build_both(dir: &Path, books: &[Book], batch: usize) -> (PathBuf, PathBuf) {
    let embedded = dir.join("embedded");
    let columnar = dir.join("columnar");
    let layout = layout();
    let mapper = BookMapper::default();
    let mut a = EmbeddedCategoryWriter::create_or_open(&embedded, &layout, MEMORY).expect("writer a");
    let mut b = ColumnarOrdinalWriter::create_or_open(&columnar, &layout, MEMORY).expect("writer b");
    for (i, bk) in books.iter().enumerate() {
        let doc = mapper.to_document(bk);
        a.add_document(&doc).expect("add a");
        b.add_document(&doc).expect("add b");
        if (i + 1) % batch == 0 {
            a.commit().expect("commit a");
            b.commit().expect("commit b");
        }
    }
    a.finish().expect("finish a");
    b.finish().expect("finish b");
    (embedded, columnar)
}

fn open_both(paths: &(PathBuf, PathBuf)) -> (EmbeddedCategoryAggregator, ColumnarOrdinalAggregator) {
    let a = EmbeddedCategoryAggregator::open(&paths.0, &layout()).expect("aggregator a");
    let b = ColumnarOrdinalAggregator::open(&paths.1, &layout()).expect("aggregator b");
    (a, b)
}

fn synthetic(n: u64) -> Vec<Book> {
    let mut source = SyntheticSource::new(n, 40, 7);
    let mut books = Vec::new();
    while let Some(batch) = source.next_batch(50).unwrap() {
        books.extend(batch);
    }
    books
}

#[test]
fn scenario_top_two_authors() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = open_both(&build_both(tmp.path(), &scenario_books(), 25));
    let request = FacetRequest::new("authors", 2);
    for agg in [&a as &dyn FacetAggregator, &b] {
        let result = agg.top_k(&Predicate::MatchAll, &request).expect("top_k");
        assert_eq!(result.pairs(), vec![("Alice", 2), ("Bob", 1)], "{}", agg.strategy());
    }
}

#[test]
fn multi_valued_document_counts_once_per_label() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = open_both(&build_both(tmp.path(), &[book(1, "Only", &["A", "B"])], 1));
    let request = FacetRequest::new("authors", 10);
    for agg in [&a as &dyn FacetAggregator, &b] {
        let result = agg.top_k(&Predicate::MatchAll, &request).unwrap();
        assert_eq!(result.pairs(), vec![("A", 1), ("B", 1)]);
    }
}

#[test]
fn ties_break_lexicographically_and_truncate() {
    let mut books = Vec::new();
    let mut id = 0;
    for (name, n) in [("Z", 3), ("Y", 5), ("X", 5)] {
        for _ in 0..n {
            id += 1;
            books.push(book(id, "t", &[name]));
        }
    }
    let tmp = TempDir::new().unwrap();
    let (a, b) = open_both(&build_both(tmp.path(), &books, 4));
    let request = FacetRequest::new("authors", 2);
    assert_eq!(a.top_k(&Predicate::MatchAll, &request).unwrap().pairs(), vec![("X", 5), ("Y", 5)]);
    assert_eq!(b.top_k(&Predicate::MatchAll, &request).unwrap().pairs(), vec![("X", 5), ("Y", 5)]);
}

#[test]
fn strategies_agree_on_synthetic_corpus() {
    let books = synthetic(300);
    let tmp = TempDir::new().unwrap();
    let (a, b) = open_both(&build_both(tmp.path(), &books, 7));
    assert_eq!(a.num_docs(), 300);
    assert_eq!(b.num_docs(), 300);
    assert_eq!(b.segment_count(), 1, "finish merges the columnar index into one dictionary");

    let predicates = [
        Predicate::MatchAll,
        Predicate::Term { field: "publisher".into(), value: "Publisher 3".into() },
        Predicate::Text { field: "author_name".into(), text: "bittinger".into() },
        Predicate::All(vec![
            Predicate::Parsed("collected".into()),
            Predicate::Term { field: "publisher".into(), value: "Publisher 1".into() },
        ]),
    ];
    let distinct = a.top_k(&Predicate::MatchAll, &FacetRequest::new("authors", 10_000)).unwrap().counts.len();
    assert!(distinct > 5);
    for predicate in &predicates {
        for k in 1..=distinct + 2 {
            for zeros in [false, true] {
                let request = FacetRequest::new("authors", k).with_zero_counts(zeros);
                let ra = a.top_k(predicate, &request).unwrap();
                let rb = b.top_k(predicate, &request).unwrap();
                assert_eq!(ra, rb, "predicate {predicate:?}, k {k}, zeros {zeros}");
            }
        }
    }
}

#[test]
fn unmerged_columnar_segments_still_agree() {
    let tmp = TempDir::new().unwrap();
    let books = synthetic(60);
    let layout = layout();
    let mapper = BookMapper::default();
    let embedded = tmp.path().join("embedded");
    let columnar = tmp.path().join("columnar");
    let mut a = EmbeddedCategoryWriter::create_or_open(&embedded, &layout, MEMORY).unwrap();
    let mut b = ColumnarOrdinalWriter::create_or_open(&columnar, &layout, MEMORY).unwrap();
    for bk in &books {
        let doc = mapper.to_document(bk);
        a.add_document(&doc).unwrap();
        b.add_document(&doc).unwrap();
        a.commit().unwrap();
        b.commit().unwrap();
    }
    let (ra, rb) = open_both(&(embedded, columnar));
    assert!(rb.segment_count() > 1, "no merge ran before finish");
    for k in [1, 3, 10, 100] {
        let request = FacetRequest::new("authors", k);
        assert_eq!(ra.top_k(&Predicate::MatchAll, &request).unwrap(), rb.top_k(&Predicate::MatchAll, &request).unwrap());
    }
    a.finish().unwrap();
    b.finish().unwrap();
}

#[test]
fn zero_counts_are_excluded_unless_requested() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = open_both(&build_both(tmp.path(), &scenario_books(), 25));
    let only_b3 = Predicate::Term { field: "isbn".into(), value: "isbn-3".into() };
    for agg in [&a as &dyn FacetAggregator, &b] {
        let default = agg.top_k(&only_b3, &FacetRequest::new("authors", 5)).unwrap();
        assert_eq!(default.pairs(), vec![("Carol", 1)]);
        let with_zeros = agg.top_k(&only_b3, &FacetRequest::new("authors", 5).with_zero_counts(true)).unwrap();
        assert_eq!(with_zeros.pairs(), vec![("Carol", 1), ("Alice", 0), ("Bob", 0)]);
    }
}

fn invalid_documents() -> Vec<Document> {
    let mut two_imprints = Document::new("1");
    two_imprints.add_facet("imprint", "Penguin");
    two_imprints.add_facet("imprint", "Vintage");
    let mut nul_label = Document::new("2");
    nul_label.add_facet("authors", "p\0q");
    let mut undeclared_dimension = Document::new("3");
    undeclared_dimension.add_facet("genre", "poetry");
    let mut undeclared_field = Document::new("4");
    undeclared_field.add_field("shelf", "A1");
    vec![two_imprints, nul_label, undeclared_dimension, undeclared_field]
}

#[test]
fn both_writers_reject_the_same_documents() {
    let tmp = TempDir::new().unwrap();
    let embedded = tmp.path().join("embedded");
    let columnar = tmp.path().join("columnar");
    let mut writers: Vec<Box<dyn FacetIndexWriter>> = vec![
        Box::new(EmbeddedCategoryWriter::create_or_open(&embedded, &layout(), MEMORY).unwrap()),
        Box::new(ColumnarOrdinalWriter::create_or_open(&columnar, &layout(), MEMORY).unwrap()),
    ];
    for writer in &mut writers {
        for doc in invalid_documents() {
            let err = writer.add_document(&doc).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{} accepted document {}: {err}", writer.strategy(), doc.id);
        }
        writer.finish().unwrap();
    }

    let (a, b) = open_both(&(embedded, columnar));
    assert_eq!(a.num_docs(), 0, "rejected documents were not written");
    assert_eq!(b.num_docs(), 0, "rejected documents were not written");
    for agg in [&a as &dyn FacetAggregator, &b] {
        let result = agg.top_k(&Predicate::MatchAll, &FacetRequest::new("authors", 10).with_zero_counts(true)).unwrap();
        assert!(result.counts.is_empty(), "{}: {:?}", agg.strategy(), result.pairs());
    }
}

#[test]
fn reopening_appends_and_rejects_foreign_layouts() {
    let tmp = TempDir::new().unwrap();
    let paths = build_both(tmp.path(), &scenario_books(), 25);

    let mut again = EmbeddedCategoryWriter::create_or_open(&paths.0, &layout(), MEMORY).expect("reopen");
    again.add_document(&BookMapper::default().to_document(&book(4, "B4", &["Bob"]))).unwrap();
    again.finish().unwrap();
    let a = EmbeddedCategoryAggregator::open(&paths.0, &layout()).unwrap();
    assert_eq!(a.num_docs(), 4);
    assert_eq!(a.top_k(&Predicate::MatchAll, &FacetRequest::new("authors", 2)).unwrap().pairs(), vec![("Alice", 2), ("Bob", 2)]);

    let other = BookMapper::default().layout(vec![DimensionSpec { name: "subjects".into(), multi_valued: true }]);
    assert!(matches!(ColumnarOrdinalWriter::create_or_open(&paths.1, &other, MEMORY), Err(Error::Configuration(_))));
}

#[test]
fn bad_requests_and_queries_are_reported() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = open_both(&build_both(tmp.path(), &scenario_books(), 25));
    for agg in [&a as &dyn FacetAggregator, &b] {
        assert!(matches!(agg.top_k(&Predicate::MatchAll, &FacetRequest::new("genre", 3)), Err(Error::Configuration(_))));
        assert!(matches!(agg.top_k(&Predicate::MatchAll, &FacetRequest::new("authors", 0)), Err(Error::Configuration(_))));
        let bad = Predicate::Term { field: "no_such_field".into(), value: "x".into() };
        assert!(matches!(agg.top_k(&bad, &FacetRequest::new("authors", 3)), Err(Error::InvalidQuery(_))));
    }
}

#[test]
fn dimension_without_values_yields_empty_result() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = open_both(&build_both(tmp.path(), &scenario_books(), 25));
    for agg in [&a as &dyn FacetAggregator, &b] {
        let result = agg.top_k(&Predicate::MatchAll, &FacetRequest::new("imprint", 3)).unwrap();
        assert!(result.counts.is_empty());
    }
}
