//! Postgres chunk store.
//!
//! One table per knowledge base, named `{kb_id}_documents`, holding one row
//! per chunk. The column set is versioned by presence: opening a store adds
//! any canonical column the live table is missing. Migration is additive
//! only; columns are never dropped or renamed, so a newer client reading an
//! older table cannot destroy data.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

use crate::chunkstore::ChunkStore;
use crate::config::PostgresConfig;
use crate::document::{DocumentChunk, FormattedDocument, Metadata};
use crate::error::{Result, StoreError};
use crate::metadata::{deserialize_metadata, serialize_metadata};
use crate::sql::{is_valid_identifier, quote_ident};

/// Canonical column set for chunk tables. New columns are appended here;
/// existing tables pick them up on open.
const COLUMNS: &[(&str, &str)] = &[
    ("doc_id", "TEXT"),
    ("document_title", "TEXT"),
    ("document_summary", "TEXT"),
    ("section_title", "TEXT"),
    ("section_summary", "TEXT"),
    ("chunk_text", "TEXT"),
    ("chunk_index", "INT"),
    ("chunk_length", "INT"),
    ("chunk_page_start", "INT"),
    ("chunk_page_end", "INT"),
    ("is_visual", "BOOLEAN"),
    ("created_on", "TEXT"),
    ("supp_id", "TEXT"),
    ("metadata", "TEXT"),
];

/// A [`ChunkStore`] backed by one Postgres table per knowledge base.
///
/// The store holds only a connection pool and the derived table name; every
/// operation borrows a connection for the duration of its statements.
pub struct PgChunkStore {
    pool: PgPool,
    table_name: String,
}

impl PgChunkStore {
    /// Connect with `config` and open (or create) the chunk table for
    /// `kb_id`.
    pub async fn open(kb_id: &str, config: &PostgresConfig) -> Result<Self> {
        let pool = config.connect().await?;
        Self::with_pool(kb_id, pool).await
    }

    /// Open (or create) the chunk table for `kb_id` on an existing pool.
    ///
    /// Fails with a validation error if `kb_id` is not a plain identifier,
    /// and with a storage error if the table cannot be created or migrated
    /// to the canonical column set.
    pub async fn with_pool(kb_id: &str, pool: PgPool) -> Result<Self> {
        if !is_valid_identifier(kb_id) {
            return Err(StoreError::Validation(format!("invalid knowledge base id: {kb_id:?}")));
        }
        let store = Self { pool, table_name: format!("{kb_id}_documents") };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// The table this store reads and writes.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn ensure_schema(&self) -> Result<()> {
        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1",
        )
        .bind(&self.table_name)
        .fetch_all(&self.pool)
        .await?;

        if existing.is_empty() {
            let columns = COLUMNS
                .iter()
                .map(|(name, sql_type)| format!("{} {sql_type}", quote_ident(name)))
                .collect::<Vec<_>>()
                .join(", ");
            let create_sql =
                format!("CREATE TABLE IF NOT EXISTS {} ({columns})", quote_ident(&self.table_name));
            sqlx::query(&create_sql).execute(&self.pool).await?;
            debug!(table = %self.table_name, "created chunk table");
        } else {
            for (name, sql_type) in COLUMNS {
                if !existing.iter().any(|column| column == name) {
                    let alter_sql = format!(
                        "ALTER TABLE {} ADD COLUMN {} {sql_type}",
                        quote_ident(&self.table_name),
                        quote_ident(name),
                    );
                    sqlx::query(&alter_sql).execute(&self.pool).await?;
                    debug!(table = %self.table_name, column = name, "added missing chunk column");
                }
            }
        }
        Ok(())
    }

    async fn chunk_row(
        &self,
        columns: &[&str],
        doc_id: &str,
        chunk_index: u32,
    ) -> Result<Option<PgRow>> {
        let column_list =
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT {column_list} FROM {} WHERE doc_id = $1 AND chunk_index = $2",
            quote_ident(&self.table_name),
        );
        let row = sqlx::query(&sql)
            .bind(doc_id)
            .bind(chunk_index as i32)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn chunk_text_column(
        &self,
        column: &str,
        doc_id: &str,
        chunk_index: u32,
    ) -> Result<Option<String>> {
        match self.chunk_row(&[column], doc_id, chunk_index).await? {
            Some(row) => Ok(row.try_get::<Option<String>, _>(0)?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ChunkStore for PgChunkStore {
    async fn add_document(
        &self,
        doc_id: &str,
        chunks: &BTreeMap<u32, DocumentChunk>,
        supp_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        // One timestamp shared by every row in the call.
        let created_on = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        let metadata = serialize_metadata(metadata);

        let column_list =
            COLUMNS.iter().map(|(name, _)| quote_ident(name)).collect::<Vec<_>>().join(", ");
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} ({column_list}) ",
            quote_ident(&self.table_name),
        ));
        // Bind order follows COLUMNS. One multi-row statement, so a
        // mid-batch failure inserts nothing.
        qb.push_values(chunks, |mut row, (chunk_index, chunk)| {
            row.push_bind(doc_id.to_string())
                .push_bind(chunk.document_title.clone())
                .push_bind(chunk.document_summary.clone())
                .push_bind(chunk.section_title.clone())
                .push_bind(chunk.section_summary.clone())
                .push_bind(chunk.chunk_text.clone())
                .push_bind(*chunk_index as i32)
                .push_bind(chunk.chunk_text.chars().count() as i32)
                .push_bind(chunk.chunk_page_start.map(|p| p as i32))
                .push_bind(chunk.chunk_page_end.map(|p| p as i32))
                .push_bind(chunk.is_visual)
                .push_bind(created_on.clone())
                .push_bind(supp_id.to_string())
                .push_bind(metadata.clone());
        });
        qb.build().execute(&self.pool).await?;
        debug!(table = %self.table_name, doc_id, count = chunks.len(), "inserted chunk rows");
        Ok(())
    }

    async fn remove_document(&self, doc_id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE doc_id = $1", quote_ident(&self.table_name));
        let result = sqlx::query(&sql).bind(doc_id).execute(&self.pool).await?;
        debug!(
            table = %self.table_name,
            doc_id,
            rows = result.rows_affected(),
            "removed document chunks"
        );
        Ok(())
    }

    async fn get_document(
        &self,
        doc_id: &str,
        include_content: bool,
    ) -> Result<Option<FormattedDocument>> {
        let sql = format!(
            "SELECT supp_id, document_title, document_summary, created_on, metadata, chunk_text \
             FROM {} WHERE doc_id = $1 ORDER BY chunk_index",
            quote_ident(&self.table_name),
        );
        let rows = sqlx::query(&sql).bind(doc_id).fetch_all(&self.pool).await?;
        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let content = if include_content {
            let mut text = String::new();
            for row in &rows {
                let chunk: Option<String> =
                    row.try_get("chunk_text")?;
                text.push_str(chunk.as_deref().unwrap_or_default());
                text.push('\n');
            }
            // Trim the single trailing separator.
            text.pop();
            Some(text)
        } else {
            None
        };

        let supp_id: Option<String> = first.try_get("supp_id")?;
        let title: Option<String> = first.try_get("document_title")?;
        let summary: Option<String> =
            first.try_get("document_summary")?;
        let created_on: Option<String> =
            first.try_get("created_on")?;
        let metadata: Option<String> = first.try_get("metadata")?;

        Ok(Some(FormattedDocument {
            id: doc_id.to_string(),
            supp_id: supp_id.unwrap_or_default(),
            title: title.unwrap_or_default(),
            summary: summary.unwrap_or_default(),
            content,
            created_on: created_on.unwrap_or_default(),
            metadata: deserialize_metadata(metadata.as_deref()),
        }))
    }

    async fn get_chunk_text(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>> {
        self.chunk_text_column("chunk_text", doc_id, chunk_index).await
    }

    async fn get_is_visual(&self, doc_id: &str, chunk_index: u32) -> Result<Option<bool>> {
        match self.chunk_row(&["is_visual"], doc_id, chunk_index).await? {
            Some(row) => Ok(row.try_get::<Option<bool>, _>(0)?),
            None => Ok(None),
        }
    }

    async fn get_chunk_page_numbers(
        &self,
        doc_id: &str,
        chunk_index: u32,
    ) -> Result<Option<(Option<u32>, Option<u32>)>> {
        let Some(row) = self
            .chunk_row(&["chunk_page_start", "chunk_page_end"], doc_id, chunk_index)
            .await?
        else {
            return Ok(None);
        };
        let start: Option<i32> = row.try_get("chunk_page_start")?;
        let end: Option<i32> = row.try_get("chunk_page_end")?;
        Ok(Some((start.map(|p| p as u32), end.map(|p| p as u32))))
    }

    async fn get_document_title(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>> {
        self.chunk_text_column("document_title", doc_id, chunk_index).await
    }

    async fn get_document_summary(
        &self,
        doc_id: &str,
        chunk_index: u32,
    ) -> Result<Option<String>> {
        self.chunk_text_column("document_summary", doc_id, chunk_index).await
    }

    async fn get_section_title(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>> {
        self.chunk_text_column("section_title", doc_id, chunk_index).await
    }

    async fn get_section_summary(&self, doc_id: &str, chunk_index: u32) -> Result<Option<String>> {
        self.chunk_text_column("section_summary", doc_id, chunk_index).await
    }

    async fn get_all_doc_ids(&self, supp_id: Option<&str>) -> Result<Vec<String>> {
        let mut sql = format!("SELECT DISTINCT doc_id FROM {}", quote_ident(&self.table_name));
        if supp_id.is_some() {
            sql.push_str(" WHERE supp_id = $1");
        }
        sql.push_str(" ORDER BY doc_id");
        let query = sqlx::query_scalar::<_, String>(&sql);
        let query = match supp_id {
            Some(supp_id) => query.bind(supp_id),
            None => query,
        };
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn get_document_count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(DISTINCT doc_id) FROM {}", quote_ident(&self.table_name));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn get_total_num_characters(&self) -> Result<u64> {
        let sql = format!(
            "SELECT COALESCE(SUM(chunk_length), 0) FROM {}",
            quote_ident(&self.table_name),
        );
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn delete(&self) -> Result<()> {
        let sql = format!("DROP TABLE {}", quote_ident(&self.table_name));
        sqlx::query(&sql).execute(&self.pool).await?;
        debug!(table = %self.table_name, "dropped chunk table");
        Ok(())
    }
}
