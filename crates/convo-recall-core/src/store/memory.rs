//! In-memory [`ExchangeStore`] for tests.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force L2 over every stored vector.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::l2_distance;
use crate::models::Exchange;

use super::{ArchivePathCount, ExchangeCandidate, ExchangeStore};

struct StoredExchange {
    exchange: Exchange,
    vector: Vec<f32>,
}

/// In-memory store with a fixed embedding dimension.
pub struct InMemoryStore {
    dims: usize,
    records: RwLock<HashMap<String, StoredExchange>>,
}

impl InMemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            records: RwLock::new(HashMap::new()),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl ExchangeStore for InMemoryStore {
    async fn upsert_exchange(&self, exchange: &Exchange, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dims {
            bail!(
                "embedding has {} dimensions, store expects {}",
                embedding.len(),
                self.dims
            );
        }
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(
            exchange.id.clone(),
            StoredExchange {
                exchange: exchange.clone(),
                vector: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn vector_search(
        &self,
        query: &[f32],
        k: usize,
        project: Option<&str>,
    ) -> Result<Vec<ExchangeCandidate>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut candidates: Vec<ExchangeCandidate> = records
            .values()
            .filter(|r| project.map_or(true, |p| r.exchange.project == p))
            .map(|r| ExchangeCandidate {
                exchange: r.exchange.clone(),
                distance: l2_distance(query, &r.vector),
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
        let records = self.records.read().map_err(poisoned)?;
        Ok(ids
            .iter()
            .filter(|id| records.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn ids_for_archive(&self, archive_path: &str) -> Result<HashSet<String>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .filter(|r| r.exchange.archive_path == archive_path)
            .map(|r| r.exchange.id.clone())
            .collect())
    }

    async fn archive_paths(&self) -> Result<Vec<ArchivePathCount>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for r in records.values() {
            *counts.entry(r.exchange.archive_path.as_str()).or_default() += 1;
        }
        let mut paths: Vec<ArchivePathCount> = counts
            .into_iter()
            .map(|(path, exchanges)| ArchivePathCount {
                archive_path: path.to_string(),
                exchanges,
            })
            .collect();
        paths.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));
        Ok(paths)
    }

    async fn delete_by_archive_path(&self, archive_path: &str) -> Result<u64> {
        let mut records = self.records.write().map_err(poisoned)?;
        let before = records.len();
        records.retain(|_, r| r.exchange.archive_path != archive_path);
        Ok((before - records.len()) as u64)
    }

    async fn recent(&self, project: Option<&str>, limit: usize) -> Result<Vec<Exchange>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut exchanges: Vec<Exchange> = records
            .values()
            .filter(|r| project.map_or(true, |p| r.exchange.project == p))
            .map(|r| r.exchange.clone())
            .collect();
        exchanges.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        exchanges.truncate(limit);
        Ok(exchanges)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records.read().map_err(poisoned)?.len() as i64)
    }
}
