use std::sync::Arc;

use tantivy::collector::{Collector, SegmentCollector};
use tantivy::columnar::Column;
use tantivy::{DocId, Score, SegmentOrdinal, SegmentReader};

/// Per-segment label counts indexed by dictionary ordinal.
#[derive(Debug)]
pub struct SegmentOrdinalCounts {
	pub segment_ord: SegmentOrdinal,
	pub counts: Vec<u64>,
}

/// Counts, for every matching document, each ordinal it references in one
/// string column. Counting is a dense array increment.
pub struct OrdinalCountCollector {
	column: String,
}

impl OrdinalCountCollector {
	pub fn for_column(column: impl Into<String>) -> Self { Self { column: column.into() } }
}

pub struct OrdinalCountSegmentCollector {
	segment_ord: SegmentOrdinal,
	ords: Option<Column<u64>>,
	counts: Vec<u64>,
}

impl Collector for OrdinalCountCollector {
	type Fruit = Vec<SegmentOrdinalCounts>;
	type Child = OrdinalCountSegmentCollector;

	fn for_segment(&self, segment_ord: SegmentOrdinal, segment: &SegmentReader) -> tantivy::Result<Self::Child> {
		// a segment where no document carries the dimension has no column
		let column = segment.fast_fields().str(&self.column)?;
		let (ords, counts) = match column {
			Some(col) => (Some(col.ords().clone()), vec![0u64; col.num_terms()]),
			None => (None, Vec::new()),
		};
		Ok(OrdinalCountSegmentCollector { segment_ord, ords, counts })
	}

	fn requires_scoring(&self) -> bool { false }

	fn merge_fruits(&self, segment_fruits: Vec<SegmentOrdinalCounts>) -> tantivy::Result<Self::Fruit> {
		Ok(segment_fruits)
	}
}

impl SegmentCollector for OrdinalCountSegmentCollector {
	type Fruit = SegmentOrdinalCounts;

	fn collect(&mut self, doc: DocId, _score: Score) {
		if let Some(ords) = &self.ords {
			for ord in ords.values_for_doc(doc) {
				self.counts[ord as usize] += 1;
			}
		}
	}

	fn harvest(self) -> Self::Fruit {
		SegmentOrdinalCounts { segment_ord: self.segment_ord, counts: self.counts }
	}
}

/// Category labels of one dimension in one segment, decoded from the category
/// postings once per reader. Labels of doc `d` are
/// `label_ids[offsets[d]..offsets[d + 1]]`, indexes into `labels`.
#[derive(Debug, Default)]
pub struct SegmentCategoryTable {
	pub labels: Vec<String>,
	offsets: Vec<u32>,
	label_ids: Vec<u32>,
}

impl SegmentCategoryTable {
	/// Builds the table from `(doc, label id)` pairs in label order.
	pub fn from_pairs(labels: Vec<String>, max_doc: DocId, pairs: &[(DocId, u32)]) -> Self {
		let mut offsets = vec![0u32; max_doc as usize + 1];
		for &(doc, _) in pairs {
			offsets[doc as usize + 1] += 1;
		}
		for i in 1..offsets.len() {
			offsets[i] += offsets[i - 1];
		}
		let mut cursor = offsets.clone();
		let mut label_ids = vec![0u32; pairs.len()];
		for &(doc, id) in pairs {
			let slot = &mut cursor[doc as usize];
			label_ids[*slot as usize] = id;
			*slot += 1;
		}
		Self { labels, offsets, label_ids }
	}

	pub fn labels_for_doc(&self, doc: DocId) -> &[u32] {
		let doc = doc as usize;
		match (self.offsets.get(doc), self.offsets.get(doc + 1)) {
			(Some(&start), Some(&end)) => &self.label_ids[start as usize..end as usize],
			_ => &[],
		}
	}
}

/// Per-segment label counts over a [`SegmentCategoryTable`].
#[derive(Debug)]
pub struct SegmentCategoryCounts {
	pub table: Arc<SegmentCategoryTable>,
	pub counts: Vec<u64>,
}

/// Counts, for every matching document, the category labels it carries in one
/// dimension. Work is linear in matches times labels per document.
pub struct CategoryCountCollector {
	tables: Vec<Arc<SegmentCategoryTable>>,
}

impl CategoryCountCollector {
	/// `tables[segment_ord]` must belong to the searcher the collector runs on.
	pub fn new(tables: Vec<Arc<SegmentCategoryTable>>) -> Self { Self { tables } }
}

pub struct CategoryCountSegmentCollector {
	table: Arc<SegmentCategoryTable>,
	counts: Vec<u64>,
}

impl Collector for CategoryCountCollector {
	type Fruit = Vec<SegmentCategoryCounts>;
	type Child = CategoryCountSegmentCollector;

	fn for_segment(&self, segment_ord: SegmentOrdinal, _segment: &SegmentReader) -> tantivy::Result<Self::Child> {
		let table = self.tables.get(segment_ord as usize).cloned().unwrap_or_default();
		let counts = vec![0u64; table.labels.len()];
		Ok(CategoryCountSegmentCollector { table, counts })
	}

	fn requires_scoring(&self) -> bool { false }

	fn merge_fruits(&self, segment_fruits: Vec<SegmentCategoryCounts>) -> tantivy::Result<Self::Fruit> {
		Ok(segment_fruits)
	}
}

impl SegmentCollector for CategoryCountSegmentCollector {
	type Fruit = SegmentCategoryCounts;

	fn collect(&mut self, doc: DocId, _score: Score) {
		for &id in self.table.labels_for_doc(doc) {
			self.counts[id as usize] += 1;
		}
	}

	fn harvest(self) -> Self::Fruit {
		SegmentCategoryCounts { table: self.table, counts: self.counts }
	}
}
