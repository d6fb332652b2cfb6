//! Data types for chunk rows, hydrated documents, and vector search.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to documents and vectors.
pub type Metadata = serde_json::Map<String, Value>;

/// Ingest-time fields for a single chunk of a document.
///
/// `chunk_index` is not part of this struct; it is the key the caller
/// supplies alongside each chunk, and `chunk_length` is always recomputed
/// from `chunk_text` at insert time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// The text content of the chunk.
    pub chunk_text: String,
    /// Title of the parent document.
    pub document_title: String,
    /// Summary of the parent document.
    pub document_summary: String,
    /// Title of the section this chunk belongs to.
    pub section_title: String,
    /// Summary of the section this chunk belongs to.
    pub section_summary: String,
    /// First page the chunk spans, if the source is paginated.
    pub chunk_page_start: Option<u32>,
    /// Last page the chunk spans, if the source is paginated.
    pub chunk_page_end: Option<u32>,
    /// Whether the chunk describes visual content (figures, tables, images).
    pub is_visual: bool,
}

/// A document hydrated from its stored chunk rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormattedDocument {
    /// The document ID.
    pub id: String,
    /// Provenance group the document was ingested under.
    pub supp_id: String,
    /// Document title.
    pub title: String,
    /// Document summary.
    pub summary: String,
    /// Full text, chunk texts joined by newline; `None` unless requested.
    pub content: Option<String>,
    /// Ingestion timestamp (unix seconds, stored as text).
    pub created_on: String,
    /// Decoded document metadata.
    pub metadata: Metadata,
}

/// A similarity search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResult {
    /// The document the matching chunk belongs to.
    pub doc_id: String,
    /// The stored embedding.
    pub vector: Vec<f32>,
    /// The stored metadata, including at least `doc_id` and `chunk_index`.
    pub metadata: Metadata,
    /// Cosine similarity (`1 - cosine_distance`); higher is closer.
    pub similarity: f64,
}

/// Comparison operators supported by [`MetadataFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
    GreaterThanEquals,
    LessThanEquals,
}

impl FilterOperator {
    /// The SQL comparison operator this maps to.
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanEquals => ">=",
            Self::LessThanEquals => "<=",
        }
    }

    /// Whether this operator compares against a list of values.
    pub(crate) fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterThanEquals => "greater_than_equals",
            Self::LessThanEquals => "less_than_equals",
        })
    }
}

/// The value side of a [`MetadataFilter`].
///
/// `in`/`not_in` take [`FilterValue::Many`]; every other operator takes
/// [`FilterValue::One`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// A list of values for membership operators.
    Many(Vec<Value>),
    /// A single comparison value.
    One(Value),
}

/// A single-field filter over the JSON metadata of stored vectors.
///
/// The field must look like a plain identifier (letters, digits,
/// underscores, not starting with a digit); anything else is rejected with a
/// validation error before any SQL is built. Values are always bound as
/// parameters, never interpolated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// The metadata field to compare.
    pub field: String,
    /// The comparison operator.
    pub operator: FilterOperator,
    /// The value(s) to compare against.
    pub value: FilterValue,
}
