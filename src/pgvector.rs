//! Postgres vector store backed by the pgvector extension.
//!
//! One table per knowledge base, named `{kb_id}_vectors`, with a
//! fixed-dimension vector column and an HNSW cosine index created alongside
//! the table. The dimension is fixed when the table is first created and is
//! not migrated; changing it requires [`VectorStore::delete`] and reopening.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

use crate::config::PostgresConfig;
use crate::document::{Metadata, MetadataFilter, VectorSearchResult};
use crate::error::{Result, StoreError};
use crate::sql::{
    format_vector, is_valid_identifier, parse_vector_text, push_metadata_filter, quote_ident,
};
use crate::vectorstore::{VectorStore, validate_batch, vector_id};

/// A [`VectorStore`] backed by Postgres with the pgvector extension.
pub struct PgVectorStore {
    pool: PgPool,
    table_name: String,
    index_name: String,
    dimension: usize,
}

impl PgVectorStore {
    /// Connect with `config` and open (or create) the vector table for
    /// `kb_id` with the given dimension.
    pub async fn open(kb_id: &str, config: &PostgresConfig, dimension: usize) -> Result<Self> {
        let pool = config.connect().await?;
        Self::with_pool(kb_id, pool, dimension).await
    }

    /// Open (or create) the vector table for `kb_id` on an existing pool.
    ///
    /// Ensures the pgvector extension is enabled. If the table does not
    /// exist it is created together with its HNSW cosine index; if it does,
    /// its dimension is whatever it was created with.
    pub async fn with_pool(kb_id: &str, pool: PgPool, dimension: usize) -> Result<Self> {
        if !is_valid_identifier(kb_id) {
            return Err(StoreError::Validation(format!("invalid knowledge base id: {kb_id:?}")));
        }
        if dimension == 0 {
            return Err(StoreError::Config("vector dimension must be greater than zero".to_string()));
        }
        let store = Self {
            pool,
            table_name: format!("{kb_id}_vectors"),
            index_name: format!("{kb_id}_embedding_index"),
            dimension,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// The table this store reads and writes.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The vector dimension this store was opened with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(&self.pool).await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_tables \
             WHERE schemaname = 'public' AND tablename = $1)",
        )
        .bind(&self.table_name)
        .fetch_one(&self.pool)
        .await?;
        if exists {
            return Ok(());
        }

        let create_sql = format!(
            "CREATE TABLE {} (id TEXT PRIMARY KEY, metadata JSONB, embedding vector({}))",
            quote_ident(&self.table_name),
            self.dimension,
        );
        sqlx::query(&create_sql).execute(&self.pool).await?;

        let index_sql = format!(
            "CREATE INDEX {} ON {} USING hnsw (embedding vector_cosine_ops) \
             WITH (m = 16, ef_construction = 64)",
            quote_ident(&self.index_name),
            quote_ident(&self.table_name),
        );
        sqlx::query(&index_sql).execute(&self.pool).await?;
        debug!(table = %self.table_name, dimension = self.dimension, "created vector table and index");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn add_vectors(&self, vectors: &[Vec<f32>], metadata: &[Metadata]) -> Result<()> {
        validate_batch(vectors, metadata, self.dimension)?;
        if vectors.is_empty() {
            return Ok(());
        }

        // Stage every row first so an id derivation failure inserts nothing.
        let mut rows = Vec::with_capacity(vectors.len());
        for (vector, meta) in vectors.iter().zip(metadata) {
            rows.push((
                vector_id(meta)?,
                serde_json::Value::Object(meta.clone()),
                format_vector(vector),
            ));
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} (id, metadata, embedding) ",
            quote_ident(&self.table_name),
        ));
        qb.push_values(rows, |mut row, (id, meta, embedding)| {
            row.push_bind(id).push_bind(meta).push_bind(embedding).push_unseparated("::vector");
        });
        qb.build().execute(&self.pool).await?;
        debug!(table = %self.table_name, count = vectors.len(), "inserted vectors");
        Ok(())
    }

    async fn remove_document(&self, doc_id: &str) -> Result<()> {
        let predicate = serde_json::json!({ "doc_id": doc_id });
        let sql = format!("DELETE FROM {} WHERE metadata @> $1", quote_ident(&self.table_name));
        let result = sqlx::query(&sql).bind(predicate).execute(&self.pool).await?;
        debug!(
            table = %self.table_name,
            doc_id,
            rows = result.rows_affected(),
            "removed document vectors"
        );
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

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT metadata, embedding::text AS embedding_text, 1 - (embedding <=> ",
        );
        qb.push_bind(format_vector(query_vector));
        qb.push("::vector) AS cosine_similarity FROM ");
        qb.push(quote_ident(&self.table_name));
        if let Some(filter) = metadata_filter {
            // Filter validation failures return before any SQL is issued.
            qb.push(" WHERE ");
            push_metadata_filter(&mut qb, filter)?;
        }
        qb.push(" ORDER BY cosine_similarity DESC LIMIT ");
        qb.push_bind(top_k as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata_value: serde_json::Value = row.try_get("metadata")?;
            let embedding_text: String = row.try_get("embedding_text")?;
            let similarity: f64 = row.try_get("cosine_similarity")?;
            let metadata = match metadata_value {
                serde_json::Value::Object(map) => map,
                _ => Metadata::new(),
            };
            let doc_id = metadata
                .get("doc_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            results.push(VectorSearchResult {
                doc_id,
                vector: parse_vector_text(&embedding_text)?,
                metadata,
                similarity,
            });
        }
        Ok(results)
    }

    async fn get_num_vectors(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table_name));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn delete(&self) -> Result<()> {
        let sql = format!("DROP TABLE {}", quote_ident(&self.table_name));
        sqlx::query(&sql).execute(&self.pool).await?;
        debug!(table = %self.table_name, "dropped vector table");
        Ok(())
    }
}
