//! Postgres-backed storage for retrieval knowledge bases.
//!
//! Two independently usable stores share a composite `(doc_id, chunk_index)`
//! key per knowledge base:
//!
//! - [`PgChunkStore`] persists document/chunk rows in a `{kb_id}_documents`
//!   table whose column set migrates additively on open.
//! - [`PgVectorStore`] persists embeddings in a `{kb_id}_vectors` table with
//!   a fixed-dimension pgvector column under an HNSW cosine index, keyed by
//!   `"{doc_id}_{chunk_index}"`.
//!
//! A knowledge-base manager writes to both with the same ids when ingesting
//! a document, searches the vector store, and hydrates chunk content back
//! out of the chunk store through the shared key. Referential integrity
//! between the two tables is the caller's job; neither store enforces a
//! foreign key on the other.
//!
//! [`InMemoryVectorStore`] implements the same [`VectorStore`] contract
//! without a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragstore::{ChunkStore, PgChunkStore, PgVectorStore, PostgresConfig, VectorStore};
//!
//! let config = PostgresConfig::from_env()?;
//! let chunks = PgChunkStore::open("my_kb", &config).await?;
//! let vectors = PgVectorStore::open("my_kb", &config, 768).await?;
//!
//! chunks.add_document("doc_1", &chunk_map, "", None).await?;
//! vectors.add_vectors(&embeddings, &metadata).await?;
//! let hits = vectors.search(&query_embedding, 10, None).await?;
//! ```

pub mod chunkstore;
pub mod config;
pub mod document;
pub mod error;
pub mod inmemory;
pub mod metadata;
pub mod pgchunk;
pub mod pgvector;
mod sql;
pub mod vectorstore;

pub use chunkstore::ChunkStore;
pub use config::{PostgresConfig, PostgresConfigBuilder};
pub use document::{
    DocumentChunk, FilterOperator, FilterValue, FormattedDocument, Metadata, MetadataFilter,
    VectorSearchResult,
};
pub use error::{Result, StoreError};
pub use inmemory::InMemoryVectorStore;
pub use metadata::{deserialize_metadata, serialize_metadata};
pub use pgchunk::PgChunkStore;
pub use pgvector::PgVectorStore;
pub use vectorstore::VectorStore;
