//! Domain types shared by the writers, aggregators and the benchmark driver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A book row together with its associated authors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub isbn: String,
    pub title: String,
    pub publisher: String,
    pub authors: Vec<Author>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// A plain (non-facet) field value. Tokenization and storage are decided by
/// the matching [`FieldSpec`] in the index layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainField {
    pub name: String,
    pub value: String,
}

/// The indexable projection of a record.
///
/// - `id`: stable document identifier
/// - `fields`: plain fields in insertion order (a name may repeat)
/// - `facets`: dimension name to its labels, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub fields: Vec<PlainField>,
    facets: BTreeMap<String, Vec<String>>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), fields: Vec::new(), facets: BTreeMap::new() }
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(PlainField { name: name.into(), value: value.into() });
    }

    /// Adds `label` to `dimension`. Empty labels and labels already present on
    /// this document for the same dimension are ignored.
    pub fn add_facet(&mut self, dimension: impl Into<String>, label: impl Into<String>) {
        let label = label.into();
        if label.is_empty() {
            return;
        }
        let labels = self.facets.entry(dimension.into()).or_default();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    pub fn facet_labels(&self, dimension: &str) -> &[String] {
        self.facets.get(dimension).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn facets(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.facets.iter().map(|(dim, labels)| (dim.as_str(), labels.as_slice()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub tokenized: bool,
    pub stored: bool,
}

impl FieldSpec {
    pub fn text(name: &str) -> Self {
        Self { name: name.to_string(), tokenized: true, stored: false }
    }

    pub fn keyword(name: &str) -> Self {
        Self { name: name.to_string(), tokenized: false, stored: false }
    }

    pub fn stored(mut self) -> Self {
        self.stored = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub name: String,
    #[serde(default)]
    pub multi_valued: bool,
}

impl DimensionSpec {
    /// Name of the columnar field backing this dimension.
    pub fn column_name(&self) -> String {
        let sanitized: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("facet_{sanitized}")
    }
}

/// Plain fields and facet dimensions shared by both index representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLayout {
    pub id_field: String,
    pub fields: Vec<FieldSpec>,
    pub dimensions: Vec<DimensionSpec>,
}

impl IndexLayout {
    pub fn dimension(&self, name: &str) -> Option<&DimensionSpec> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id_field.is_empty() {
            return Err(Error::Configuration("id field name must not be empty".into()));
        }
        let mut taken: Vec<String> = vec![self.id_field.clone()];
        for field in &self.fields {
            if field.name.is_empty() || taken.contains(&field.name) {
                return Err(Error::Configuration(format!("duplicate or empty field name '{}'", field.name)));
            }
            taken.push(field.name.clone());
        }
        let mut seen = Vec::new();
        for dim in &self.dimensions {
            if dim.name.is_empty() {
                return Err(Error::Configuration("facet dimension name must not be empty".into()));
            }
            if seen.contains(&dim.name) {
                return Err(Error::Configuration(format!("facet dimension '{}' declared twice", dim.name)));
            }
            seen.push(dim.name.clone());
            let column = dim.column_name();
            if taken.contains(&column) {
                return Err(Error::Configuration(format!(
                    "facet dimension '{}' maps to column '{}' which is already in use",
                    dim.name, column
                )));
            }
            taken.push(column);
        }
        Ok(())
    }

    /// Checks a document against the layout before anything is written for it.
    pub fn validate_document(&self, doc: &Document) -> Result<()> {
        for field in &doc.fields {
            if self.field(&field.name).is_none() {
                return Err(Error::Configuration(format!(
                    "document '{}' carries undeclared field '{}'",
                    doc.id, field.name
                )));
            }
        }
        for (dimension, labels) in doc.facets() {
            let spec = self.dimension(dimension).ok_or_else(|| {
                Error::Configuration(format!("document '{}' carries undeclared facet dimension '{}'", doc.id, dimension))
            })?;
            if labels.len() > 1 && !spec.multi_valued {
                return Err(Error::Configuration(format!(
                    "document '{}' has {} labels for dimension '{}' which is not declared multi_valued",
                    doc.id,
                    labels.len(),
                    dimension
                )));
            }
            if let Some(bad) = labels.iter().find(|l| l.contains('\u{0}')) {
                return Err(Error::Configuration(format!("label {bad:?} contains a NUL byte")));
            }
        }
        Ok(())
    }
}

/// The two facet encodings under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    EmbeddedCategory,
    ColumnarOrdinal,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::EmbeddedCategory, Strategy::ColumnarOrdinal];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::EmbeddedCategory => "embedded-category",
            Strategy::ColumnarOrdinal => "columnar-ordinal",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    CountDesc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRequest {
    pub dimension: String,
    pub top_k: usize,
    #[serde(default)]
    pub include_zero_counts: bool,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl FacetRequest {
    pub fn new(dimension: impl Into<String>, top_k: usize) -> Self {
        Self { dimension: dimension.into(), top_k, include_zero_counts: false, sort_order: SortOrder::CountDesc }
    }

    pub fn with_zero_counts(mut self, include: bool) -> Self {
        self.include_zero_counts = include;
        self
    }

    pub fn validate(&self, layout: &IndexLayout) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Configuration("top_k must be greater than zero".into()));
        }
        if layout.dimension(&self.dimension).is_none() {
            return Err(Error::Configuration(format!("unknown facet dimension '{}'", self.dimension)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetResult {
    pub dimension: String,
    pub counts: Vec<FacetCount>,
}

impl FacetResult {
    pub fn pairs(&self) -> Vec<(&str, u64)> {
        self.counts.iter().map(|c| (c.label.as_str(), c.count)).collect()
    }
}

/// Selects which documents take part in an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    #[default]
    MatchAll,
    /// Exact, untokenized term on one field.
    Term { field: String, value: String },
    /// Query-parser text restricted to one field.
    Text { field: String, text: String },
    /// Query-parser text over every tokenized field.
    Parsed(String),
    /// Conjunction.
    All(Vec<Predicate>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> IndexLayout {
        IndexLayout {
            id_field: "id".into(),
            fields: vec![FieldSpec::text("title").stored()],
            dimensions: vec![
                DimensionSpec { name: "authors".into(), multi_valued: true },
                DimensionSpec { name: "publisher".into(), multi_valued: false },
            ],
        }
    }

    #[test]
    fn add_facet_skips_empty_and_repeated_labels() {
        let mut doc = Document::new("1");
        doc.add_facet("authors", "Alice");
        doc.add_facet("authors", "");
        doc.add_facet("authors", "Bob");
        doc.add_facet("authors", "Alice");
        assert_eq!(doc.facet_labels("authors"), ["Alice".to_string(), "Bob".to_string()]);
        assert!(doc.facet_labels("missing").is_empty());
    }

    #[test]
    fn single_valued_dimension_rejects_multiple_labels() {
        let mut doc = Document::new("1");
        doc.add_facet("publisher", "Acme");
        doc.add_facet("publisher", "Globex");
        let err = layout().validate_document(&doc).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }

    #[test]
    fn undeclared_dimension_and_field_are_rejected() {
        let mut doc = Document::new("1");
        doc.add_facet("genre", "sf");
        assert!(layout().validate_document(&doc).is_err());

        let mut doc = Document::new("2");
        doc.add_field("isbn", "123");
        assert!(layout().validate_document(&doc).is_err());
    }

    #[test]
    fn column_names_are_sanitized_and_checked_for_collisions() {
        let dim = DimensionSpec { name: "authors.name".into(), multi_valued: true };
        assert_eq!(dim.column_name(), "facet_authors_name");

        let mut bad = layout();
        bad.fields.push(FieldSpec::keyword("facet_authors"));
        assert!(bad.validate().is_err());
        assert!(layout().validate().is_ok());
    }

    #[test]
    fn request_requires_positive_k_and_known_dimension() {
        assert!(FacetRequest::new("authors", 0).validate(&layout()).is_err());
        assert!(FacetRequest::new("genre", 3).validate(&layout()).is_err());
        assert!(FacetRequest::new("authors", 3).validate(&layout()).is_ok());
    }
}
