use std::collections::HashMap;
use std::path::Path;

use tantivy::directory::MmapDirectory;
use tantivy::schema::{
    FacetOptions, Facet, Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::{Index, IndexReader, ReloadPolicy};

use facetbench_core::{Error, IndexLayout, Result, Strategy};

/// Facet field holding every `/dimension/label` category token.
pub const CATEGORY_FIELD: &str = "categories";
pub const TEXT_TOKENIZER: &str = "book_text";

pub fn build_schema(layout: &IndexLayout, strategy: Strategy) -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(&layout.id_field, STRING | STORED);
	for spec in &layout.fields {
		let options = if spec.tokenized {
			let indexing = TextFieldIndexing::default().set_tokenizer(TEXT_TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
			TextOptions::default().set_indexing_options(indexing)
		} else {
			STRING
		};
		let options = if spec.stored { options.set_stored() } else { options };
		schema_builder.add_text_field(&spec.name, options);
	}
	match strategy {
		Strategy::EmbeddedCategory => {
			schema_builder.add_facet_field(CATEGORY_FIELD, FacetOptions::default());
		}
		Strategy::ColumnarOrdinal => {
			for dim in &layout.dimensions {
				schema_builder.add_text_field(&dim.column_name(), TextOptions::default().set_fast(None));
			}
		}
	}
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","but","by","for","if","in","into","is","it","no","not","of","on","or","such","that","the","their","then","there","these","they","this","to","was","will","with",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TEXT_TOKENIZER, tokenizer);
}

/// Opens the index at `path`, creating directory and index when absent.
/// An existing index built with a different layout is rejected.
pub fn create_or_open(path: &Path, layout: &IndexLayout, strategy: Strategy) -> Result<Index> {
	std::fs::create_dir_all(path)?;
	let directory = MmapDirectory::open(path).map_err(|e| Error::storage(format!("opening {}", path.display()), e))?;
	let index = Index::open_or_create(directory, build_schema(layout, strategy)).map_err(|e| match e {
		tantivy::TantivyError::SchemaError(msg) => {
			Error::Configuration(format!("{} index at {} has a different layout: {}", strategy, path.display(), msg))
		}
		other => Error::storage(format!("opening {}", path.display()), other),
	})?;
	register_tokenizer(&index);
	Ok(index)
}

/// Opens an existing index read-only and checks it carries the layout's fields.
pub fn open_existing(path: &Path, layout: &IndexLayout, strategy: Strategy) -> Result<Index> {
	let index = Index::open_in_dir(path).map_err(|e| Error::storage(format!("opening {}", path.display()), e))?;
	let expected = build_schema(layout, strategy);
	let actual = index.schema();
	for (_, entry) in expected.fields() {
		if actual.get_field(entry.name()).is_err() {
			return Err(Error::Configuration(format!(
				"{} index at {} lacks field '{}'",
				strategy,
				path.display(),
				entry.name()
			)));
		}
	}
	register_tokenizer(&index);
	Ok(index)
}

pub fn snapshot_reader(index: &Index) -> Result<IndexReader> {
	let reader: tantivy::Result<IndexReader> = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into();
	reader.map_err(|e| Error::storage("opening an index reader", e))
}

/// Name to field for every plain field of the layout.
pub fn plain_fields(schema: &Schema, layout: &IndexLayout) -> Result<HashMap<String, Field>> {
	let mut out = HashMap::with_capacity(layout.fields.len());
	for spec in &layout.fields {
		let field = schema.get_field(&spec.name).map_err(|e| Error::Configuration(e.to_string()))?;
		out.insert(spec.name.clone(), field);
	}
	Ok(out)
}

pub fn category_token(dimension: &str, label: &str) -> Facet {
	Facet::from_path([dimension, label])
}

/// Term-dictionary bounds `[lower, upper)` enclosing every category token of
/// `dimension` and excluding the dimension token itself.
pub fn dimension_term_range(dimension: &str) -> (Vec<u8>, Vec<u8>) {
	let root = Facet::from_path([dimension]);
	let mut lower = root.encoded_str().as_bytes().to_vec();
	let mut upper = lower.clone();
	lower.push(0u8);
	upper.push(1u8);
	(lower, upper)
}
