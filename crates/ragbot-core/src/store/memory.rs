//! In-memory [`VectorStore`] for tests.
//!
//! Units live in a `Vec` behind `std::sync::RwLock`; search is brute-force
//! cosine similarity.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ScoredUnit, TextUnit};

use super::{rank, VectorStore};

struct StoredUnit {
    unit: TextUnit,
    vector: Vec<f32>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    units: RwLock<Vec<StoredUnit>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert_unit(&self, unit: &TextUnit, vector: &[f32], _model: &str) -> Result<()> {
        let mut units = self.units.write().map_err(poisoned)?;
        units.retain(|s| s.unit.source_id != unit.source_id);
        units.push(StoredUnit {
            unit: unit.clone(),
            vector: vector.to_vec(),
        });
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<ScoredUnit>> {
        let units = self.units.read().map_err(poisoned)?;
        let candidates = units
            .iter()
            .filter(|s| source_id.map_or(true, |id| s.unit.source_id == id))
            .map(|s| ScoredUnit {
                unit: s.unit.clone(),
                score: cosine_similarity(query_vec, &s.vector) as f64,
            })
            .collect();
        Ok(rank(candidates, limit))
    }

    async fn source_ids(&self) -> Result<Vec<String>> {
        let units = self.units.read().map_err(poisoned)?;
        let mut ids: Vec<String> = units.iter().map(|s| s.unit.source_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.units.read().map_err(poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = InMemoryStore::new();
        store
            .upsert_unit(&TextUnit::new("a", SourceKind::Pdf, "a.pdf"), &[1.0, 0.0], "m")
            .await
            .unwrap();
        store
            .upsert_unit(&TextUnit::new("b", SourceKind::Csv, "b.csv"), &[0.0, 1.0], "m")
            .await
            .unwrap();

        let hits = store.search(&[0.1, 0.9], 10, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].unit.source_id, "b.csv");

        let hits = store.search(&[0.1, 0.9], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_same_source() {
        let store = InMemoryStore::new();
        let v = [1.0, 1.0];
        store
            .upsert_unit(&TextUnit::new("old", SourceKind::Docx, "cv.docx"), &v, "m")
            .await
            .unwrap();
        store
            .upsert_unit(&TextUnit::new("new", SourceKind::Docx, "cv.docx"), &v, "m")
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&v, 3, None).await.unwrap();
        assert_eq!(hits[0].unit.content, "new");
    }

    #[tokio::test]
    async fn scoped_search_only_sees_one_file() {
        let store = InMemoryStore::new();
        store
            .upsert_unit(&TextUnit::new("x", SourceKind::Pdf, "x.pdf"), &[1.0, 0.0], "m")
            .await
            .unwrap();
        store
            .upsert_unit(&TextUnit::new("y", SourceKind::Pdf, "y.pdf"), &[0.0, 1.0], "m")
            .await
            .unwrap();
        let hits = store.search(&[1.0, 0.0], 3, Some("y.pdf")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.source_id, "y.pdf");
        assert_eq!(
            store.source_ids().await.unwrap(),
            vec!["x.pdf".to_string(), "y.pdf".to_string()]
        );
    }
}
