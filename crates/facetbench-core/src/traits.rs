use crate::error::Result;
use crate::types::{Book, Document, FacetRequest, FacetResult, Predicate, Strategy};

/// Appends documents to one facet-encoding index.
pub trait FacetIndexWriter: Send {
    fn strategy(&self) -> Strategy;
    fn add_document(&mut self, doc: &Document) -> Result<()>;
    /// Makes every document added so far durable and visible to new readers.
    fn commit(&mut self) -> Result<()>;
    /// Commits pending documents, completes strategy-specific finalisation and
    /// releases the writer. Further calls fail.
    fn finish(&mut self) -> Result<()>;
}

/// Computes top-K facet counts over a committed index snapshot.
pub trait FacetAggregator: Send + Sync {
    fn strategy(&self) -> Strategy;
    fn top_k(&self, query: &Predicate, request: &FacetRequest) -> Result<FacetResult>;
}

/// Forward-only, batched scroll over the record store.
pub trait RecordSource {
    /// Returns up to `max` records, or `None` once the source is exhausted.
    fn next_batch(&mut self, max: usize) -> Result<Option<Vec<Book>>>;
}
