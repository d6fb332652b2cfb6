//! Vector store trait: per-knowledge-base embedding rows with similarity
//! search.

use async_trait::async_trait;
use serde_json::Value;

use crate::document::{Metadata, MetadataFilter, VectorSearchResult};
use crate::error::{Result, StoreError};
use crate::sql::filter_value_text;

/// A per-knowledge-base store of embedding rows.
///
/// Rows are keyed by `"{doc_id}_{chunk_index}"`, derived from each entry's
/// metadata so the key always matches the chunk store's addressing. The
/// vector dimension is fixed when the store is created.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert one row per vector. `vectors` and `metadata` must be the same
    /// length and every vector must match the store's dimension; each
    /// metadata entry must carry `doc_id` and `chunk_index`.
    async fn add_vectors(&self, vectors: &[Vec<f32>], metadata: &[Metadata]) -> Result<()>;

    /// Delete every row whose metadata `doc_id` matches. Succeeds even when
    /// none exist.
    async fn remove_document(&self, doc_id: &str) -> Result<()>;

    /// The `top_k` nearest vectors by cosine similarity, descending, with an
    /// optional single-field metadata filter.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        metadata_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Number of stored vectors.
    async fn get_num_vectors(&self) -> Result<u64>;

    /// Drop the knowledge base's table. Irreversible.
    async fn delete(&self) -> Result<()>;
}

/// Derive the row id `"{doc_id}_{chunk_index}"` from a vector's metadata.
pub(crate) fn vector_id(metadata: &Metadata) -> Result<String> {
    let doc_id = metadata.get("doc_id").and_then(Value::as_str).ok_or_else(|| {
        StoreError::Validation("vector metadata is missing a doc_id string".to_string())
    })?;
    let chunk_index = metadata.get("chunk_index").ok_or_else(|| {
        StoreError::Validation("vector metadata is missing chunk_index".to_string())
    })?;
    Ok(format!("{doc_id}_{}", filter_value_text(chunk_index)))
}

/// Check batch parity and per-vector dimension before any row is staged.
pub(crate) fn validate_batch(
    vectors: &[Vec<f32>],
    metadata: &[Metadata],
    dimension: usize,
) -> Result<()> {
    if vectors.len() != metadata.len() {
        return Err(StoreError::Validation(format!(
            "got {} vectors and {} metadata entries",
            vectors.len(),
            metadata.len()
        )));
    }
    for vector in vectors {
        if vector.len() != dimension {
            return Err(StoreError::Validation(format!(
                "vector has dimension {}, store is configured for {dimension}",
                vector.len()
            )));
        }
    }
    Ok(())
}
