//! Chunk store trait: per-knowledge-base document/chunk rows.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::document::{DocumentChunk, FormattedDocument, Metadata};
use crate::error::Result;

/// A per-knowledge-base store of document chunk rows.
///
/// Rows are keyed by `(doc_id, chunk_index)`. Documents are written and
/// removed in bulk and never mutated in place; re-ingestion is
/// remove-then-add. Point lookups return `Ok(None)` when the key is absent.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert one row per chunk. All rows in the call share one `created_on`
    /// timestamp, `chunk_length` is recomputed from each chunk's text, and
    /// `metadata` is stored in its encoded form.
    async fn add_document(
        &self,
        doc_id: &str,
        chunks: &BTreeMap<u32, DocumentChunk>,
        supp_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<()>;

    /// Delete every row for `doc_id`. Succeeds even when none exist.
    async fn remove_document(&self, doc_id: &str) -> Result<()>;

    /// Document-level fields from the first matching row. With
    /// `include_content`, all chunk texts joined by newline in index order,
    /// with the single trailing separator trimmed.
    async fn get_document(
        &self,
        doc_id: &str,
        include_content: bool,
    ) -> Result<Option<FormattedDocument>>;

    /// The text of one chunk.
    async fn get_chunk_text(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>>;

    /// Whether one chunk carries visual content.
    async fn get_is_visual(&self, doc_id: &str, chunk_index: u32) -> Result<Option<bool>>;

    /// The page range of one chunk; the inner options mirror the nullable
    /// page columns.
    async fn get_chunk_page_numbers(
        &self,
        doc_id: &str,
        chunk_index: u32,
    ) -> Result<Option<(Option<u32>, Option<u32>)>>;

    /// The document title stored on one chunk row.
    async fn get_document_title(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>>;

    /// The document summary stored on one chunk row.
    async fn get_document_summary(
        &self,
        doc_id: &str,
        chunk_index: u32,
    ) -> Result<Option<String>>;

    /// The section title stored on one chunk row.
    async fn get_section_title(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>>;

    /// The section summary stored on one chunk row.
    async fn get_section_summary(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>>;

    /// Distinct document IDs in order, optionally restricted to one
    /// provenance group.
    async fn get_all_doc_ids(&self, supp_id: Option<&str>) -> Result<Vec<String>>;

    /// Number of distinct documents; zero on an empty table.
    async fn get_document_count(&self) -> Result<u64>;

    /// Sum of stored chunk lengths; zero on an empty table.
    async fn get_total_num_characters(&self) -> Result<u64>;

    /// Drop the knowledge base's table. Irreversible.
    async fn delete(&self) -> Result<()>;
}
