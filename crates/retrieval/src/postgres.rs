//! PostgreSQL + pgvector document store.
//!
//! - Lazy `sqlx` pool: no connection is opened until the first query
//! - Similarity search with pgvector's cosine `<=>` operator
//! - Schema migration from `migrations/001_create_documents.sql`
//!
//! # Setup
//!
//! ```sql
//! CREATE EXTENSION IF NOT EXISTS vector;
//! ```
//!
//! `migrate()` issues this itself when the role is allowed to.

use async_trait::async_trait;
use ragent_config::VectorStoreConfig;
use ragent_core::error::RetrievalError;
use ragent_core::retrieval::{VectorRow, VectorStore};
use sqlx::Row;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use crate::vector::to_vector_literal;

const MIGRATION: &str = include_str!("../migrations/001_create_documents.sql");

/// Statements for one document table. The table name is a validated
/// identifier, so formatting it into SQL is safe.
#[derive(Debug, Clone)]
struct Statements {
    insert: String,
    search: String,
    count: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            insert: format!(
                "INSERT INTO {table} (id, content, metadata, embedding) \
                 VALUES ($1, $2, $3, $4::vector) RETURNING id"
            ),
            search: format!(
                "SELECT id, content, metadata, (embedding <=> $1::vector)::float8 AS distance \
                 FROM {table} \
                 ORDER BY embedding <=> $1::vector ASC \
                 LIMIT $2"
            ),
            count: format!("SELECT COUNT(*) AS cnt FROM {table}"),
        }
    }
}

fn migration_sql(table: &str, dimension: usize) -> String {
    MIGRATION
        .replace("{table}", table)
        .replace("{dimension}", &dimension.to_string())
}

/// Document store backed by a `documents` table with a `vector(N)` column.
pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    dimension: usize,
    sql: Statements,
}

impl PgVectorStore {
    /// Build the pool without connecting. `min_connections` are opened in the
    /// background once the pool is first used.
    pub fn connect_lazy(config: &VectorStoreConfig, dimension: usize) -> Result<Self, RetrievalError> {
        let options: PgConnectOptions = config
            .connection_url()
            .parse()
            .map_err(|e| RetrievalError::Storage(format!("Invalid PostgreSQL URL: {e}")))?;

        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(options);

        info!(
            table = %config.table,
            min = config.min_connections,
            max = config.max_connections,
            "PostgreSQL vector store configured"
        );
        Ok(Self::from_pool(pool, &config.table, dimension))
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool, table: &str, dimension: usize) -> Self {
        Self {
            pool,
            table: table.to_string(),
            dimension,
            sql: Statements::for_table(table),
        }
    }

    /// Create the extension, table and index if missing.
    pub async fn migrate(&self) -> Result<(), RetrievalError> {
        let sql = migration_sql(&self.table, self.dimension);
        sqlx::raw_sql(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| RetrievalError::MigrationFailed(e.to_string()))?;

        info!(table = %self.table, dimension = self.dimension, "Document schema migration complete");
        Ok(())
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), RetrievalError> {
        if embedding.len() != self.dimension {
            return Err(RetrievalError::QueryFailed(format!(
                "embedding has {} dimensions, table {} expects {}",
                embedding.len(),
                self.table,
                self.dimension
            )));
        }
        Ok(())
    }
}

fn row_to_vector_row(row: &PgRow) -> Result<VectorRow, sqlx::Error> {
    Ok(VectorRow {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        metadata: row.try_get("metadata")?,
        distance: row.try_get("distance")?,
    })
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: serde_json::Value,
    ) -> Result<String, RetrievalError> {
        self.check_dimension(embedding)?;

        let id: String = sqlx::query_scalar(&self.sql.insert)
            .bind(Uuid::new_v4().to_string())
            .bind(content)
            .bind(metadata)
            .bind(to_vector_literal(embedding))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RetrievalError::Storage(format!("Failed to insert document: {e}")))?;

        debug!(id = %id, "Stored document");
        Ok(id)
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorRow>, RetrievalError> {
        self.check_dimension(embedding)?;

        let rows = sqlx::query(&self.sql.search)
            .bind(to_vector_literal(embedding))
            .bind(top_k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("Vector search failed: {e}")))?;

        rows.iter()
            .map(row_to_vector_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RetrievalError::QueryFailed(format!("Malformed row: {e}")))
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        let row = sqlx::query(&self.sql.count)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("Failed to count documents: {e}")))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RetrievalError::QueryFailed(e.to_string()))?;
        Ok(count.max(0) as usize)
    }

    async fn ping(&self) -> Result<(), RetrievalError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RetrievalError::Storage(format!("PostgreSQL unreachable: {e}")))?;
        Ok(())
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("PostgreSQL pool closed");
        }
    }
}

// ── Unit tests (no DB required) ──────────────────────────────────────────
