use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{DocId, DocSet, Index, IndexReader, Searcher, SegmentReader, TERMINATED};

use facetbench_core::ranking::rank;
use facetbench_core::traits::FacetAggregator;
use facetbench_core::types::FacetCount;
use facetbench_core::{Error, FacetRequest, FacetResult, IndexLayout, Predicate, Result, Strategy};

use crate::collector::{CategoryCountCollector, OrdinalCountCollector, SegmentCategoryTable, SegmentOrdinalCounts};
use crate::query::to_query;
use crate::tantivy_utils::{dimension_term_range, open_existing, snapshot_reader, CATEGORY_FIELD};

/// A reader handle over one committed snapshot. Each handle is independent;
/// concurrent workers should open their own.
struct Snapshot {
	index: Index,
	reader: IndexReader,
	layout: IndexLayout,
}

impl Snapshot {
	fn open(path: &Path, layout: &IndexLayout, strategy: Strategy) -> Result<Self> {
		let index = open_existing(path, layout, strategy)?;
		let reader = snapshot_reader(&index)?;
		Ok(Self { index, reader, layout: layout.clone() })
	}

	fn searcher(&self) -> Searcher { self.reader.searcher() }
}

/// Strategy A aggregation. Opening a handle reads the postings of every
/// `/dimension/label` category token once per segment into a per-document
/// label table; a query then visits only the category labels of its matching
/// documents.
pub struct EmbeddedCategoryAggregator {
	snapshot: Snapshot,
	tables: HashMap<String, Vec<Arc<SegmentCategoryTable>>>,
}

impl EmbeddedCategoryAggregator {
	pub fn open(path: &Path, layout: &IndexLayout) -> Result<Self> {
		let snapshot = Snapshot::open(path, layout, Strategy::EmbeddedCategory)?;
		let category_field = snapshot.index.schema().get_field(CATEGORY_FIELD).map_err(|e| Error::Configuration(e.to_string()))?;
		let searcher = snapshot.searcher();
		let mut tables = HashMap::with_capacity(layout.dimensions.len());
		for dim in &layout.dimensions {
			let per_segment = searcher
				.segment_readers()
				.iter()
				.map(|segment| decode_categories(segment, category_field, &dim.name).map(Arc::new))
				.collect::<Result<Vec<_>>>()?;
			tables.insert(dim.name.clone(), per_segment);
		}
		tracing::debug!(path = %path.display(), dimensions = tables.len(), "decoded category tables");
		Ok(Self { snapshot, tables })
	}

	pub fn num_docs(&self) -> u64 { self.snapshot.searcher().num_docs() }

	pub fn segment_count(&self) -> usize { self.snapshot.searcher().segment_readers().len() }
}

/// Reads every category token of `dimension` in one segment and inverts its
/// postings into a per-document table.
fn decode_categories(segment: &SegmentReader, field: Field, dimension: &str) -> Result<SegmentCategoryTable> {
	let inverted = segment.inverted_index(field).map_err(|e| Error::storage("opening category postings", e))?;
	let (lower, upper) = dimension_term_range(dimension);
	let mut terms = inverted
		.terms()
		.range()
		.ge(&lower)
		.lt(&upper)
		.into_stream()
		.map_err(|e| Error::storage("scanning category tokens", e))?;
	let mut labels = Vec::new();
	let mut pairs: Vec<(DocId, u32)> = Vec::new();
	while terms.advance() {
		let label = std::str::from_utf8(&terms.key()[lower.len()..]).map_err(|e| Error::storage("decoding a category token", e))?;
		let id = u32::try_from(labels.len()).map_err(|e| Error::storage("numbering category labels", e))?;
		labels.push(label.to_string());
		let mut postings = inverted
			.read_postings_from_terminfo(terms.value(), IndexRecordOption::Basic)
			.map_err(|e| Error::storage("reading category postings", e))?;
		let mut doc = postings.doc();
		while doc != TERMINATED {
			pairs.push((doc, id));
			doc = postings.advance();
		}
	}
	Ok(SegmentCategoryTable::from_pairs(labels, segment.max_doc(), &pairs))
}

impl FacetAggregator for EmbeddedCategoryAggregator {
	fn strategy(&self) -> Strategy { Strategy::EmbeddedCategory }

	fn top_k(&self, query: &Predicate, request: &FacetRequest) -> Result<FacetResult> {
		request.validate(&self.snapshot.layout)?;
		let tables = self
			.tables
			.get(&request.dimension)
			.ok_or_else(|| Error::Configuration(format!("unknown facet dimension '{}'", request.dimension)))?;
		let query = to_query(&self.snapshot.index, query)?;
		let fruits = self
			.snapshot
			.searcher()
			.search(&*query, &CategoryCountCollector::new(tables.clone()))
			.map_err(|e| Error::storage("counting category labels", e))?;

		let mut tallies: HashMap<String, u64> = HashMap::new();
		for seg in &fruits {
			for (id, count) in seg.counts.iter().enumerate() {
				if *count == 0 && !request.include_zero_counts {
					continue;
				}
				let label = &seg.table.labels[id];
				match tallies.get_mut(label) {
					Some(total) => *total += count,
					None => {
						tallies.insert(label.clone(), *count);
					}
				}
			}
		}
		Ok(rank(tallies, request))
	}
}

/// Strategy B aggregation: count ordinals of the dimension's column into a
/// dense array while the query runs, then resolve only the winners.
pub struct ColumnarOrdinalAggregator {
	snapshot: Snapshot,
}

impl ColumnarOrdinalAggregator {
	pub fn open(path: &Path, layout: &IndexLayout) -> Result<Self> {
		Ok(Self { snapshot: Snapshot::open(path, layout, Strategy::ColumnarOrdinal)? })
	}

	pub fn num_docs(&self) -> u64 { self.snapshot.searcher().num_docs() }

	pub fn segment_count(&self) -> usize { self.snapshot.searcher().segment_readers().len() }

	/// One segment means one sorted dictionary, so ordinal order is label order
	/// and ranking can run on ordinals.
	fn rank_by_ordinal(&self, searcher: &Searcher, column: &str, seg: &SegmentOrdinalCounts, request: &FacetRequest) -> Result<FacetResult> {
		let mut entries: Vec<(u64, u64)> = seg
			.counts
			.iter()
			.enumerate()
			.filter(|(_, count)| request.include_zero_counts || **count > 0)
			.map(|(ord, count)| (ord as u64, *count))
			.collect();
		let k = request.top_k.min(entries.len());
		let cmp = |a: &(u64, u64), b: &(u64, u64)| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0));
		if k > 0 && k < entries.len() {
			entries.select_nth_unstable_by(k - 1, cmp);
		}
		entries.truncate(k);
		entries.sort_unstable_by(cmp);

		let dictionary = searcher
			.segment_reader(seg.segment_ord)
			.fast_fields()
			.str(column)
			.map_err(|e| Error::storage("opening the ordinal dictionary", e))?
			.ok_or_else(|| Error::Configuration(format!("column '{column}' vanished from its segment")))?;
		let mut counts = Vec::with_capacity(entries.len());
		let mut label = String::new();
		for (ord, count) in entries {
			label.clear();
			dictionary.ord_to_str(ord, &mut label).map_err(|e| Error::storage("resolving an ordinal", e))?;
			counts.push(FacetCount { label: label.clone(), count });
		}
		Ok(FacetResult { dimension: request.dimension.clone(), counts })
	}

	/// Several segments have independent dictionaries: resolve every counted
	/// ordinal and merge by label.
	fn rank_by_label(&self, searcher: &Searcher, column: &str, segments: &[&SegmentOrdinalCounts], request: &FacetRequest) -> Result<FacetResult> {
		let mut tallies: HashMap<String, u64> = HashMap::new();
		let mut label = String::new();
		for seg in segments {
			let Some(dictionary) = searcher
				.segment_reader(seg.segment_ord)
				.fast_fields()
				.str(column)
				.map_err(|e| Error::storage("opening the ordinal dictionary", e))?
			else {
				continue;
			};
			for (ord, count) in seg.counts.iter().enumerate() {
				if *count == 0 && !request.include_zero_counts {
					continue;
				}
				label.clear();
				dictionary.ord_to_str(ord as u64, &mut label).map_err(|e| Error::storage("resolving an ordinal", e))?;
				*tallies.entry(label.clone()).or_insert(0) += count;
			}
		}
		Ok(rank(tallies, request))
	}
}

impl FacetAggregator for ColumnarOrdinalAggregator {
	fn strategy(&self) -> Strategy { Strategy::ColumnarOrdinal }

	fn top_k(&self, query: &Predicate, request: &FacetRequest) -> Result<FacetResult> {
		request.validate(&self.snapshot.layout)?;
		let column = self
			.snapshot
			.layout
			.dimension(&request.dimension)
			.map(|d| d.column_name())
			.ok_or_else(|| Error::Configuration(format!("unknown facet dimension '{}'", request.dimension)))?;
		let query = to_query(&self.snapshot.index, query)?;
		let searcher = self.snapshot.searcher();
		let fruits = searcher
			.search(&*query, &OrdinalCountCollector::for_column(column.as_str()))
			.map_err(|e| Error::storage("counting ordinals", e))?;

		let populated: Vec<&SegmentOrdinalCounts> = fruits.iter().filter(|f| !f.counts.is_empty()).collect();
		match populated.as_slice() {
			[] => Ok(FacetResult { dimension: request.dimension.clone(), counts: Vec::new() }),
			[single] => self.rank_by_ordinal(&searcher, &column, single, request),
			many => self.rank_by_label(&searcher, &column, many, request),
		}
	}
}

/// Opens the aggregator implementing `strategy` over the index at `path`.
pub fn open_aggregator(strategy: Strategy, path: &Path, layout: &IndexLayout) -> Result<Box<dyn FacetAggregator>> {
	Ok(match strategy {
		Strategy::EmbeddedCategory => Box::new(EmbeddedCategoryAggregator::open(path, layout)?),
		Strategy::ColumnarOrdinal => Box::new(ColumnarOrdinalAggregator::open(path, layout)?),
	})
}
