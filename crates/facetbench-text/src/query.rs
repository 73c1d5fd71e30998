//! Translation of [`Predicate`] into tantivy queries against either index.
use tantivy::query::{AllQuery, BooleanQuery, Query, QueryParser, TermQuery};
use tantivy::schema::{FieldType, IndexRecordOption};
use tantivy::{Index, Term};

use facetbench_core::{Error, Predicate, Result};

use crate::tantivy_utils::TEXT_TOKENIZER;

pub fn to_query(index: &Index, predicate: &Predicate) -> Result<Box<dyn Query>> {
	let schema = index.schema();
	match predicate {
		Predicate::MatchAll => Ok(Box::new(AllQuery)),
		Predicate::Term { field, value } => {
			let field = schema.get_field(field).map_err(|e| Error::InvalidQuery(e.to_string()))?;
			Ok(Box::new(TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic)))
		}
		Predicate::Text { field, text } => {
			let field = schema.get_field(field).map_err(|e| Error::InvalidQuery(e.to_string()))?;
			QueryParser::for_index(index, vec![field]).parse_query(text).map_err(|e| Error::InvalidQuery(e.to_string()))
		}
		Predicate::Parsed(text) => {
			let defaults = schema
				.fields()
				.filter(|(_, entry)| match entry.field_type() {
					FieldType::Str(options) => options.get_indexing_options().is_some_and(|i| i.tokenizer() == TEXT_TOKENIZER),
					_ => false,
				})
				.map(|(field, _)| field)
				.collect();
			QueryParser::for_index(index, defaults).parse_query(text).map_err(|e| Error::InvalidQuery(e.to_string()))
		}
		Predicate::All(parts) => {
			if parts.is_empty() {
				return Ok(Box::new(AllQuery));
			}
			let queries = parts.iter().map(|p| to_query(index, p)).collect::<Result<Vec<_>>>()?;
			Ok(Box::new(BooleanQuery::intersection(queries)))
		}
	}
}
