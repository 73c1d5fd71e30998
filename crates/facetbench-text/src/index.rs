use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tantivy::indexer::NoMergePolicy;
use tantivy::schema::Field;
use tantivy::{Index, IndexWriter, TantivyDocument};

use facetbench_core::traits::FacetIndexWriter;
use facetbench_core::{Document, Error, IndexLayout, Result, Strategy};

use crate::tantivy_utils::{category_token, create_or_open, plain_fields, CATEGORY_FIELD};

/// Plumbing shared by both writers: the open index, a single-threaded tantivy
/// writer and the plain-field mapping.
struct WriterCore {
	strategy: Strategy,
	path: PathBuf,
	index: Index,
	writer: Option<IndexWriter>,
	layout: IndexLayout,
	id_field: Field,
	fields: HashMap<String, Field>,
	uncommitted: u64,
	committed: u64,
}

impl WriterCore {
	fn open(strategy: Strategy, path: &Path, layout: &IndexLayout, memory_bytes: usize) -> Result<Self> {
		layout.validate()?;
		let index = create_or_open(path, layout, strategy)?;
		let writer: IndexWriter = index
			.writer_with_num_threads(1, memory_bytes)
			.map_err(|e| Error::storage(format!("creating the {strategy} writer"), e))?;
		let schema = index.schema();
		let id_field = schema.get_field(&layout.id_field).map_err(|e| Error::Configuration(e.to_string()))?;
		let fields = plain_fields(&schema, layout)?;
		tracing::debug!(%strategy, path = %path.display(), "opened index writer");
		Ok(Self {
			strategy,
			path: path.to_path_buf(),
			index,
			writer: Some(writer),
			layout: layout.clone(),
			id_field,
			fields,
			uncommitted: 0,
			committed: 0,
		})
	}

	fn writer(&mut self) -> Result<&mut IndexWriter> {
		let strategy = self.strategy;
		self.writer.as_mut().ok_or_else(|| Error::Configuration(format!("the {strategy} writer is already finished")))
	}

	/// Tantivy document carrying the id and plain fields of `doc`.
	fn base_document(&self, doc: &Document) -> Result<TantivyDocument> {
		let mut out = TantivyDocument::default();
		out.add_text(self.id_field, &doc.id);
		for field in &doc.fields {
			let target = self.fields.get(&field.name).ok_or_else(|| {
				Error::Configuration(format!("document '{}' carries undeclared field '{}'", doc.id, field.name))
			})?;
			out.add_text(*target, &field.value);
		}
		Ok(out)
	}

	fn add(&mut self, doc: TantivyDocument) -> Result<()> {
		let strategy = self.strategy;
		self.writer()?
			.add_document(doc)
			.map_err(|e| Error::storage(format!("adding a document to the {strategy} index"), e))?;
		self.uncommitted += 1;
		Ok(())
	}

	fn commit(&mut self) -> Result<()> {
		let strategy = self.strategy;
		self.writer()?
			.commit()
			.map_err(|e| Error::storage(format!("committing the {strategy} index"), e))?;
		self.committed += self.uncommitted;
		self.uncommitted = 0;
		tracing::trace!(%strategy, committed = self.committed, "commit");
		Ok(())
	}

	fn take_writer(&mut self) -> Result<IndexWriter> {
		self.commit()?;
		let strategy = self.strategy;
		self.writer.take().ok_or_else(|| Error::Configuration(format!("the {strategy} writer is already finished")))
	}
}

/// Strategy A: every facet label becomes a `/dimension/label` category token
/// in the postings of the `categories` facet field.
pub struct EmbeddedCategoryWriter {
	core: WriterCore,
	category_field: Field,
}

impl EmbeddedCategoryWriter {
	pub fn create_or_open(path: &Path, layout: &IndexLayout, memory_bytes: usize) -> Result<Self> {
		let core = WriterCore::open(Strategy::EmbeddedCategory, path, layout, memory_bytes)?;
		let category_field = core.index.schema().get_field(CATEGORY_FIELD).map_err(|e| Error::Configuration(e.to_string()))?;
		Ok(Self { core, category_field })
	}
}

impl FacetIndexWriter for EmbeddedCategoryWriter {
	fn strategy(&self) -> Strategy { Strategy::EmbeddedCategory }

	fn add_document(&mut self, doc: &Document) -> Result<()> {
		self.core.layout.validate_document(doc)?;
		let mut out = self.core.base_document(doc)?;
		for (dimension, labels) in doc.facets() {
			for label in labels {
				out.add_facet(self.category_field, category_token(dimension, label));
			}
		}
		self.core.add(out)
	}

	fn commit(&mut self) -> Result<()> { self.core.commit() }

	fn finish(&mut self) -> Result<()> {
		let writer = self.core.take_writer()?;
		writer.wait_merging_threads().map_err(|e| Error::storage("waiting for embedded-category merges", e))?;
		tracing::info!(path = %self.core.path.display(), documents = self.core.committed, "embedded-category index finished");
		Ok(())
	}
}

/// Strategy B: every dimension is a columnar string field. The storage engine
/// keeps a sorted dictionary per segment and each document references its
/// labels by ordinal; `finish` merges everything into one segment so the
/// dictionary is global.
pub struct ColumnarOrdinalWriter {
	core: WriterCore,
	columns: HashMap<String, Field>,
}

impl ColumnarOrdinalWriter {
	pub fn create_or_open(path: &Path, layout: &IndexLayout, memory_bytes: usize) -> Result<Self> {
		let mut core = WriterCore::open(Strategy::ColumnarOrdinal, path, layout, memory_bytes)?;
		// merging happens once, at the end of the build
		core.writer()?.set_merge_policy(Box::new(NoMergePolicy));
		let schema = core.index.schema();
		let mut columns = HashMap::with_capacity(layout.dimensions.len());
		for dim in &layout.dimensions {
			let field = schema.get_field(&dim.column_name()).map_err(|e| Error::Configuration(e.to_string()))?;
			columns.insert(dim.name.clone(), field);
		}
		Ok(Self { core, columns })
	}
}

impl FacetIndexWriter for ColumnarOrdinalWriter {
	fn strategy(&self) -> Strategy { Strategy::ColumnarOrdinal }

	fn add_document(&mut self, doc: &Document) -> Result<()> {
		self.core.layout.validate_document(doc)?;
		let mut out = self.core.base_document(doc)?;
		for (dimension, labels) in doc.facets() {
			let column = self.columns.get(dimension).ok_or_else(|| {
				Error::Configuration(format!("document '{}' carries undeclared facet dimension '{}'", doc.id, dimension))
			})?;
			for label in labels {
				out.add_text(*column, label);
			}
		}
		self.core.add(out)
	}

	fn commit(&mut self) -> Result<()> { self.core.commit() }

	fn finish(&mut self) -> Result<()> {
		let mut writer = self.core.take_writer()?;
		let segments = self.core.index.searchable_segment_ids().map_err(|e| Error::storage("listing columnar-ordinal segments", e))?;
		if segments.len() > 1 {
			tracing::debug!(segments = segments.len(), "merging columnar-ordinal segments");
			writer.merge(&segments).wait().map_err(|e| Error::storage("merging columnar-ordinal segments", e))?;
		}
		writer.wait_merging_threads().map_err(|e| Error::storage("waiting for columnar-ordinal merges", e))?;
		tracing::info!(path = %self.core.path.display(), documents = self.core.committed, "columnar-ordinal index finished");
		Ok(())
	}
}

/// Opens the writer implementing `strategy` at `path`.
pub fn open_writer(strategy: Strategy, path: &Path, layout: &IndexLayout, memory_bytes: usize) -> Result<Box<dyn FacetIndexWriter>> {
	Ok(match strategy {
		Strategy::EmbeddedCategory => Box::new(EmbeddedCategoryWriter::create_or_open(path, layout, memory_bytes)?),
		Strategy::ColumnarOrdinal => Box::new(ColumnarOrdinalWriter::create_or_open(path, layout, memory_bytes)?),
	})
}
