//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers the storage operations the index needs:
//! upserting an embedded [`TextUnit`] and brute-force similarity search,
//! optionally scoped to one file. Backends are pluggable (SQLite in the app
//! crate, [`memory::InMemoryStore`] for tests).
//!
//! Implementations must be `Send + Sync` to be shared across request tasks.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ScoredUnit, TextUnit};

/// Abstract storage backend for embedded text units.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_unit`](VectorStore::upsert_unit) | Insert or replace a unit by `source_id` |
/// | [`search`](VectorStore::search) | Cosine similarity search |
/// | [`source_ids`](VectorStore::source_ids) | All indexed file identifiers |
/// | [`count`](VectorStore::count) | Number of stored units |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a unit with its embedding, replacing any unit that has the
    /// same `source_id`.
    async fn upsert_unit(&self, unit: &TextUnit, vector: &[f32], model: &str) -> Result<()>;

    /// Return up to `limit` units ranked by similarity to `query_vec`.
    ///
    /// With `source_id`, only that file's units are candidates.
    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<ScoredUnit>>;

    /// Indexed file identifiers, sorted.
    async fn source_ids(&self) -> Result<Vec<String>>;

    async fn count(&self) -> Result<usize>;
}

/// Sorts by descending score and keeps the first `limit`.
pub fn rank(mut candidates: Vec<ScoredUnit>, limit: usize) -> Vec<ScoredUnit> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(limit);
    candidates
}
