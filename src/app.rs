//! Startup wiring.
//!
//! Every service is built once from [`Config`] and shared through `Arc`
//! handles; nothing is global.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::chatbot::{Chatbot, ChatbotOptions};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::Extractor;
use crate::generator::OllamaGenerator;
use crate::index::IndexStore;
use crate::ingest::{self, IngestReport};
use crate::media::MediaBackends;
use crate::sqlite_cache::SqliteCache;
use crate::sqlite_store::SqliteStore;
use crate::uploads::{UploadRegistry, Uploads};
use crate::web_search::GoogleSearch;
use crate::{db, migrate};

pub struct App {
    pub config: Arc<Config>,
    pub index: IndexStore,
    pub extractor: Extractor,
    pub chatbot: Arc<Chatbot>,
    pub uploads: Arc<Uploads>,
}

impl App {
    /// Opens the database (running migrations) and builds every backend.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        let index = IndexStore::new(
            embedder,
            Arc::new(SqliteStore::new(pool.clone())),
            config.embedding.batch_size,
        );

        let media = MediaBackends::from_config(&config.media)
            .context("failed to set up media backends")?;
        let extractor = Extractor::new(Arc::new(media));

        let cache = SqliteCache::new(pool.clone());
        let purged = cache.purge_expired().await?;
        if purged > 0 {
            tracing::debug!(purged, "removed expired cache entries");
        }

        let chatbot = Chatbot::new(
            index.clone(),
            Arc::new(cache),
            Arc::new(OllamaGenerator::new(&config.generator)?),
            Arc::new(GoogleSearch::from_config(&config.web_search)?),
            ChatbotOptions::from_config(config),
        );

        let uploads = Uploads::new(
            config.server.upload_dir.clone(),
            UploadRegistry::new(pool.clone()),
            extractor.clone(),
            index.clone(),
        );

        Ok(Self {
            config: Arc::new(config.clone()),
            index,
            extractor,
            chatbot: Arc::new(chatbot),
            uploads: Arc::new(uploads),
        })
    }

    /// Extracts and indexes `paths`, or the configured corpus when empty.
    pub async fn index_corpus(&self, paths: &[std::path::PathBuf]) -> Result<IngestReport> {
        let paths = if paths.is_empty() {
            self.config.ingest.files.as_slice()
        } else {
            paths
        };
        ingest::index_files(paths, self.config.ingest.workers, &self.extractor, &self.index).await
    }
}
