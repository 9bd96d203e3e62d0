//! Storage abstraction for exchange records and their embeddings.
//!
//! The [`ExchangeStore`] trait is everything the indexer, verifier and
//! search need from a backend. The SQLite implementation lives in the
//! application crate; [`memory::InMemoryStore`] backs unit tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::Exchange;

/// A nearest-neighbor candidate returned by [`ExchangeStore::vector_search`].
#[derive(Debug, Clone)]
pub struct ExchangeCandidate {
    pub exchange: Exchange,
    /// Euclidean distance from the query vector.
    pub distance: f64,
}

/// An archive path referenced by the index and how many records point at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivePathCount {
    pub archive_path: String,
    pub exchanges: i64,
}

/// Abstract storage backend for indexed exchanges.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_exchange`](ExchangeStore::upsert_exchange) | Insert or replace a record and its vector |
/// | [`vector_search`](ExchangeStore::vector_search) | k nearest records by L2 distance |
/// | [`existing_ids`](ExchangeStore::existing_ids) | Which of the given ids are stored |
/// | [`ids_for_archive`](ExchangeStore::ids_for_archive) | All ids parsed from one archive file |
/// | [`archive_paths`](ExchangeStore::archive_paths) | Distinct archive paths with counts |
/// | [`delete_by_archive_path`](ExchangeStore::delete_by_archive_path) | Drop every record of one file |
/// | [`recent`](ExchangeStore::recent) | Newest records first |
/// | [`count`](ExchangeStore::count) | Total records |
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Insert or replace the record keyed by `exchange.id`, together with
    /// its embedding. Both halves are written atomically.
    async fn upsert_exchange(&self, exchange: &Exchange, embedding: &[f32]) -> Result<()>;

    /// The `k` records nearest to `query`, ascending by distance, ties by id.
    async fn vector_search(
        &self,
        query: &[f32],
        k: usize,
        project: Option<&str>,
    ) -> Result<Vec<ExchangeCandidate>>;

    /// The subset of `ids` already present in the store.
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>>;

    /// Ids of every record whose provenance is `archive_path`.
    async fn ids_for_archive(&self, archive_path: &str) -> Result<HashSet<String>>;

    /// Distinct archive paths referenced by stored records, sorted.
    async fn archive_paths(&self) -> Result<Vec<ArchivePathCount>>;

    /// Delete every record (and vector) whose provenance is `archive_path`.
    /// Returns the number of records removed.
    async fn delete_by_archive_path(&self, archive_path: &str) -> Result<u64>;

    /// Most recent records by timestamp, optionally for one project.
    async fn recent(&self, project: Option<&str>, limit: usize) -> Result<Vec<Exchange>>;

    /// Number of stored records.
    async fn count(&self) -> Result<i64>;
}
