//! SQLite-backed [`ExchangeStore`].
//!
//! Records live in `exchanges`, vectors in `exchange_vectors` keyed by the
//! same id. Nearest-neighbor search is brute force: every vector of the
//! (optionally project-filtered) set is decoded and scored by L2 distance.

use std::collections::HashSet;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use convo_recall_core::embedding::{blob_to_vec, l2_distance, vec_to_blob, EMBEDDING_DIMS};
use convo_recall_core::models::Exchange;
use convo_recall_core::store::{ArchivePathCount, ExchangeCandidate, ExchangeStore};

use crate::config::Config;
use crate::{db, migrate};

/// Bound parameters per `IN (...)` lookup.
const ID_BATCH: usize = 500;

/// SQLite implementation of [`ExchangeStore`].
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    /// Wrap a migrated pool. `dims` is the only embedding length accepted.
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        let dims = config.embedding.dims.unwrap_or(EMBEDDING_DIMS);
        Ok(Self::new(pool, dims))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_exchange(row: &SqliteRow) -> Exchange {
    Exchange {
        id: row.get("id"),
        project: row.get("project"),
        timestamp: row.get("timestamp"),
        user_message: row.get("user_message"),
        assistant_message: row.get("assistant_message"),
        archive_path: row.get("archive_path"),
        line_start: row.get("line_start"),
        line_end: row.get("line_end"),
    }
}

#[async_trait]
impl ExchangeStore for SqliteStore {
    async fn upsert_exchange(&self, exchange: &Exchange, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dims {
            bail!(
                "Embedding for exchange {} has {} dimensions, store expects {}",
                exchange.id,
                embedding.len(),
                self.dims
            );
        }
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO exchanges (id, project, timestamp, user_message, assistant_message,
                                   archive_path, line_start, line_end, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                project = excluded.project,
                timestamp = excluded.timestamp,
                user_message = excluded.user_message,
                assistant_message = excluded.assistant_message,
                archive_path = excluded.archive_path,
                line_start = excluded.line_start,
                line_end = excluded.line_end,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&exchange.id)
        .bind(&exchange.project)
        .bind(&exchange.timestamp)
        .bind(&exchange.user_message)
        .bind(&exchange.assistant_message)
        .bind(&exchange.archive_path)
        .bind(exchange.line_start)
        .bind(exchange.line_end)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM exchange_vectors WHERE id = ?")
            .bind(&exchange.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO exchange_vectors (id, dims, embedding) VALUES (?, ?, ?)")
            .bind(&exchange.id)
            .bind(embedding.len() as i64)
            .bind(vec_to_blob(embedding))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn vector_search(
        &self,
        query: &[f32],
        k: usize,
        project: Option<&str>,
    ) -> Result<Vec<ExchangeCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.project, e.timestamp, e.user_message, e.assistant_message,
                   e.archive_path, e.line_start, e.line_end, v.embedding
            FROM exchange_vectors v
            JOIN exchanges e ON e.id = v.id
            WHERE (? IS NULL OR e.project = ?)
            "#,
        )
        .bind(project)
        .bind(project)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<ExchangeCandidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ExchangeCandidate {
                    distance: l2_distance(query, &blob_to_vec(&blob)),
                    exchange: row_to_exchange(row),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.exchange.id.cmp(&b.exchange.id))
        });
        candidates.truncate(k);

        Ok(candidates)
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        for batch in ids.chunks(ID_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!("SELECT id FROM exchanges WHERE id IN ({})", placeholders);
            let mut query = sqlx::query_scalar::<_, String>(&sql);
            for id in batch {
                query = query.bind(id);
            }
            found.extend(query.fetch_all(&self.pool).await?);
        }
        Ok(found)
    }

    async fn ids_for_archive(&self, archive_path: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM exchanges WHERE archive_path = ?")
            .bind(archive_path)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn archive_paths(&self) -> Result<Vec<ArchivePathCount>> {
        let rows = sqlx::query(
            r#"
            SELECT archive_path, COUNT(*) AS exchanges
            FROM exchanges
            GROUP BY archive_path
            ORDER BY archive_path
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ArchivePathCount {
                archive_path: row.get("archive_path"),
                exchanges: row.get("exchanges"),
            })
            .collect())
    }

    async fn delete_by_archive_path(&self, archive_path: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM exchange_vectors WHERE id IN (SELECT id FROM exchanges WHERE archive_path = ?)",
        )
        .bind(archive_path)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM exchanges WHERE archive_path = ?")
            .bind(archive_path)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    async fn recent(&self, project: Option<&str>, limit: usize) -> Result<Vec<Exchange>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project, timestamp, user_message, assistant_message,
                   archive_path, line_start, line_end
            FROM exchanges
            WHERE (? IS NULL OR project = ?)
            ORDER BY timestamp DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(project)
        .bind(project)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_exchange).collect())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exchanges")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
