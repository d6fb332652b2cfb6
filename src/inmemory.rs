//! In-memory vector store for development and tests.
//!
//! Rows live in a `HashMap` behind a `tokio::sync::RwLock`. The contract
//! matches the Postgres backend: same id derivation, dimension checks,
//! filter semantics, and descending-similarity ordering, without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::document::{FilterOperator, FilterValue, Metadata, MetadataFilter, VectorSearchResult};
use crate::error::{Result, StoreError};
use crate::sql::{filter_value_text, validate_filter};
use crate::vectorstore::{VectorStore, validate_batch, vector_id};

/// A [`VectorStore`] holding rows in process memory.
pub struct InMemoryVectorStore {
    dimension: usize,
    rows: RwLock<HashMap<String, StoredVector>>,
}

struct StoredVector {
    metadata: Metadata,
    embedding: Vec<f32>,
}

impl InMemoryVectorStore {
    /// Create an empty store with a fixed vector dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension, rows: RwLock::new(HashMap::new()) }
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero
/// magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Evaluate an already-validated filter against one row, using the same
/// text comparisons Postgres applies to `metadata->>` extractions.
fn matches_filter(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    let Some(actual) = metadata.get(&filter.field) else {
        return false;
    };
    let actual = filter_value_text(actual);
    match (filter.operator, &filter.value) {
        (FilterOperator::In, FilterValue::Many(values)) => {
            values.iter().any(|v| filter_value_text(v) == actual)
        }
        (FilterOperator::NotIn, FilterValue::Many(values)) => {
            values.iter().all(|v| filter_value_text(v) != actual)
        }
        (operator, FilterValue::One(value)) => {
            let expected = filter_value_text(value);
            match operator {
                FilterOperator::Equals => actual == expected,
                FilterOperator::NotEquals => actual != expected,
                FilterOperator::GreaterThan => actual > expected,
                FilterOperator::LessThan => actual < expected,
                FilterOperator::GreaterThanEquals => actual >= expected,
                FilterOperator::LessThanEquals => actual <= expected,
                FilterOperator::In | FilterOperator::NotIn => false,
            }
        }
        // Arity mismatches are rejected by validate_filter before this runs.
        _ => false,
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_vectors(&self, vectors: &[Vec<f32>], metadata: &[Metadata]) -> Result<()> {
        validate_batch(vectors, metadata, self.dimension)?;

        // Stage every row first so an id derivation failure inserts nothing.
        let mut staged = Vec::with_capacity(vectors.len());
        for (vector, meta) in vectors.iter().zip(metadata) {
            staged.push((
                vector_id(meta)?,
                StoredVector { metadata: meta.clone(), embedding: vector.clone() },
            ));
        }

        let mut rows = self.rows.write().await;
        for (id, row) in staged {
            rows.insert(id, row);
        }
        Ok(())
    }

    async fn remove_document(&self, doc_id: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.retain(|_, row| row.metadata.get("doc_id").and_then(Value::as_str) != Some(doc_id));
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        metadata_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorSearchResult>> {
        if query_vector.len() != self.dimension {
            return Err(StoreError::Validation(format!(
                "query vector has dimension {}, store is configured for {}",
                query_vector.len(),
                self.dimension,
            )));
        }
        if let Some(filter) = metadata_filter {
            validate_filter(filter)?;
        }

        let rows = self.rows.read().await;
        let mut results: Vec<VectorSearchResult> = rows
            .values()
            .filter(|row| metadata_filter.is_none_or(|f| matches_filter(&row.metadata, f)))
            .map(|row| VectorSearchResult {
                doc_id: row
                    .metadata
                    .get("doc_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                vector: row.embedding.clone(),
                metadata: row.metadata.clone(),
                similarity: cosine_similarity(&row.embedding, query_vector),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn get_num_vectors(&self) -> Result<u64> {
        Ok(self.rows.read().await.len() as u64)
    }

    async fn delete(&self) -> Result<()> {
        self.rows.write().await.clear();
        Ok(())
    }
}
