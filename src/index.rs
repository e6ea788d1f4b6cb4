//! Embedding + vector store facade.
//!
//! [`IndexStore`] pairs an [`Embedder`] with a [`VectorStore`]: indexing
//! embeds text units in batches and upserts them; searching embeds the query
//! and returns the nearest units.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use ragbot_core::embedding::Embedder;
use ragbot_core::models::{ScoredUnit, TextUnit};
use ragbot_core::store::VectorStore;

#[derive(Clone)]
pub struct IndexStore {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl IndexStore {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Embeds and stores `units`. Returns the number written.
    ///
    /// An empty batch is a no-op.
    pub async fn index(&self, units: &[TextUnit]) -> Result<usize> {
        if units.is_empty() {
            warn!("index called with an empty batch; nothing to do");
            return Ok(0);
        }

        let model = self.embedder.model_name().to_string();
        let mut written = 0usize;

        for batch in units.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|u| u.content.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .context("embedding batch failed")?;
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }
            for (unit, vector) in batch.iter().zip(&vectors) {
                self.store.upsert_unit(unit, vector, &model).await?;
                written += 1;
            }
        }

        info!(written, model = %model, "indexed text units");
        Ok(written)
    }

    /// Embeds `query` and returns up to `top_k` nearest units, optionally
    /// restricted to one file.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<ScoredUnit>> {
        let query_vec = self.embedder.embed_query(query).await?;
        self.search_vector(&query_vec, top_k, source_id).await
    }

    /// Nearest units to an already embedded query.
    pub async fn search_vector(
        &self,
        query_vec: &[f32],
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<ScoredUnit>> {
        self.store.search(query_vec, top_k, source_id).await
    }

    pub async fn source_ids(&self) -> Result<Vec<String>> {
        self.store.source_ids().await
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HashEmbedder;
    use ragbot_core::models::SourceKind;
    use ragbot_core::store::memory::InMemoryStore;

    fn index() -> (IndexStore, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (
            IndexStore::new(Arc::new(HashEmbedder::default()), store.clone(), 2),
            store,
        )
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let (index, store) = index();
        assert_eq!(index.index(&[]).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn indexes_across_batches_and_finds_best_match() {
        let (index, store) = index();
        let units = vec![
            TextUnit::new("student grades math science", SourceKind::Csv, "sample.csv"),
            TextUnit::new("humanitarian aid report", SourceKind::Pdf, "sample.pdf"),
            TextUnit::new("software engineer resume", SourceKind::Docx, "sample.docx"),
        ];
        assert_eq!(index.index(&units).await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 3);

        let hits = index.search("student grades", 1, None).await.unwrap();
        assert_eq!(hits[0].unit.source_id, "sample.csv");
    }
}
