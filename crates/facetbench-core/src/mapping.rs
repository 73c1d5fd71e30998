//! Projection of book records into indexable documents.

use crate::types::{Book, DimensionSpec, Document, FieldSpec, IndexLayout};

pub const ID_FIELD: &str = "id";
pub const TITLE_FIELD: &str = "title";
pub const ISBN_FIELD: &str = "isbn";
pub const PUBLISHER_FIELD: &str = "publisher";
pub const AUTHOR_NAME_FIELD: &str = "author_name";
pub const DEFAULT_AUTHOR_DIMENSION: &str = "authors";

#[derive(Debug, Clone)]
pub struct BookMapper {
    author_dimension: String,
}

impl Default for BookMapper {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHOR_DIMENSION)
    }
}

impl BookMapper {
    pub fn new(author_dimension: impl Into<String>) -> Self {
        Self { author_dimension: author_dimension.into() }
    }

    pub fn author_dimension(&self) -> &str {
        &self.author_dimension
    }

    pub fn field_specs() -> Vec<FieldSpec> {
        vec![
            FieldSpec::text(TITLE_FIELD).stored(),
            FieldSpec::keyword(ISBN_FIELD).stored(),
            FieldSpec::keyword(PUBLISHER_FIELD).stored(),
            FieldSpec::text(AUTHOR_NAME_FIELD),
        ]
    }

    /// Layout covering every field this mapper emits plus `dimensions`.
    pub fn layout(&self, dimensions: Vec<DimensionSpec>) -> IndexLayout {
        IndexLayout { id_field: ID_FIELD.to_string(), fields: Self::field_specs(), dimensions }
    }

    /// Every named author yields a tokenized `author_name` copy for free-text
    /// search and one untokenized label on the author dimension.
    pub fn to_document(&self, book: &Book) -> Document {
        let mut doc = Document::new(book.id.to_string());
        doc.add_field(TITLE_FIELD, book.title.as_str());
        doc.add_field(ISBN_FIELD, book.isbn.as_str());
        doc.add_field(PUBLISHER_FIELD, book.publisher.as_str());
        for author in &book.authors {
            if author.name.trim().is_empty() {
                continue;
            }
            doc.add_field(AUTHOR_NAME_FIELD, author.name.as_str());
            doc.add_facet(self.author_dimension.as_str(), author.name.as_str());
        }
        doc
    }
}
