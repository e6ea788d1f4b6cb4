//! Query orchestration.
//!
//! [`Chatbot::answer`] runs one query end to end:
//!
//! ```text
//! cache lookup ─hit──────────────────────────────────────────▶ return
//!      │ miss
//!      ▼
//! embed query ─▶ retrieve (overview: top-10, one per kind;
//!                          kind: top-3 filtered; file: top-3 scoped)
//!      ▼
//! bounded context ─▶ [web snippets] ─▶ prompt ─▶ generate ─▶ cache ─▶ return
//! ```
//!
//! Web search runs on a two-permit pool under a timeout and degrades to no
//! snippets on any failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use ragbot_core::cache::{CacheKey, SummaryCache};
use ragbot_core::context::{select_one_per_kind, AssembledContext, ContextBudget};
use ragbot_core::models::{SourceFilter, TextUnit, WebSnippet};
use ragbot_core::services::{Generator, SamplingParams, WebSearcher};

use crate::config::Config;
use crate::error::{QueryError, Stage};
use crate::index::IndexStore;

/// Concurrent web searches allowed across all requests.
const WEB_SEARCH_PERMITS: usize = 2;

/// Retrieval and generation knobs, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ChatbotOptions {
    pub top_k: usize,
    pub overview_top_k: usize,
    pub budget: ContextBudget,
    pub sampling: SamplingParams,
    pub web_num_results: usize,
    pub web_timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for ChatbotOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            overview_top_k: 10,
            budget: ContextBudget::default(),
            sampling: SamplingParams::default(),
            web_num_results: 3,
            web_timeout: Duration::from_secs(10),
            cache_ttl: ragbot_core::cache::DEFAULT_TTL,
        }
    }
}

impl ChatbotOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            overview_top_k: config.retrieval.overview_top_k,
            budget: config.retrieval.budget(),
            sampling: config.generator.sampling(),
            web_num_results: config.web_search.num_results,
            web_timeout: Duration::from_secs(config.web_search.timeout_secs),
            cache_ttl: config.cache.ttl(),
        }
    }
}

pub struct Chatbot {
    index: IndexStore,
    cache: Arc<dyn SummaryCache>,
    generator: Arc<dyn Generator>,
    web: Arc<dyn WebSearcher>,
    options: ChatbotOptions,
    web_pool: Arc<Semaphore>,
}

impl Chatbot {
    pub fn new(
        index: IndexStore,
        cache: Arc<dyn SummaryCache>,
        generator: Arc<dyn Generator>,
        web: Arc<dyn WebSearcher>,
        options: ChatbotOptions,
    ) -> Self {
        Self {
            index,
            cache,
            generator,
            web,
            options,
            web_pool: Arc::new(Semaphore::new(WEB_SEARCH_PERMITS)),
        }
    }

    /// Answers `query_text` within `filter`, optionally enriched with web
    /// results. Identical `(user, scope, query, web)` requests within the
    /// cache TTL return the cached summary without touching the index.
    pub async fn answer(
        &self,
        query_text: &str,
        filter: &SourceFilter,
        use_web_search: bool,
        user: &str,
    ) -> Result<String, QueryError> {
        if query_text.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let key = CacheKey::new(user, filter.label(), query_text, use_web_search);
        if let Some(cached) = self
            .cache
            .get(&key)
            .await
            .map_err(QueryError::upstream(Stage::Cache))?
        {
            debug!(key = key.as_str(), "cache hit");
            return Ok(cached);
        }

        let mut assembled = self.assemble(query_text, filter).await?;

        if use_web_search {
            let snippets = self.web_snippets(query_text).await;
            assembled.merge_web(&snippets, self.options.budget.web_snippets);
        }

        let prompt = assembled.prompt();
        let summary = self
            .generator
            .summarize(&prompt, &self.options.sampling)
            .await
            .map_err(QueryError::upstream(Stage::Generator))?;

        self.cache
            .put(&key, &summary, self.options.cache_ttl)
            .await
            .map_err(QueryError::upstream(Stage::Cache))?;

        info!(
            scope = filter.label(),
            web = use_web_search,
            sources = ?assembled.sources,
            "answered query"
        );
        Ok(summary)
    }

    /// Retrieves units for `filter` and builds the bounded context.
    async fn assemble(
        &self,
        query_text: &str,
        filter: &SourceFilter,
    ) -> Result<AssembledContext, QueryError> {
        let query_vec = self
            .index
            .embedder()
            .embed_query(query_text)
            .await
            .map_err(QueryError::upstream(Stage::Embedding))?;

        let (limit, scope) = match filter {
            SourceFilter::All => (self.options.overview_top_k, None),
            SourceFilter::Kind(_) => (self.options.top_k, None),
            SourceFilter::File(name) => (self.options.top_k, Some(name.as_str())),
        };

        let hits = self
            .index
            .search_vector(&query_vec, limit, scope)
            .await
            .map_err(QueryError::upstream(Stage::VectorStore))?;
        let units: Vec<TextUnit> = hits.into_iter().map(|h| h.unit).collect();

        if filter.is_all() {
            let selected = select_one_per_kind(units);
            return Ok(AssembledContext::overview(&selected, &self.options.budget));
        }

        let selected: Vec<TextUnit> = units.into_iter().filter(|u| filter.matches(u)).collect();
        if selected.is_empty() {
            return Err(QueryError::NotFound(filter.label().to_string()));
        }
        Ok(AssembledContext::filtered(
            &selected,
            filter.label(),
            &self.options.budget,
        ))
    }

    /// Runs the web search on the shared pool, bounded by the configured
    /// timeout. Never fails.
    async fn web_snippets(&self, query_text: &str) -> Vec<WebSnippet> {
        let pool = Arc::clone(&self.web_pool);
        let web = Arc::clone(&self.web);
        let query = query_text.to_string();
        let num = self.options.web_num_results;

        let mut task = tokio::spawn(async move {
            let _permit = pool.acquire_owned().await.ok()?;
            Some(web.search(&query, num).await)
        });

        match tokio::time::timeout(self.options.web_timeout, &mut task).await {
            Ok(Ok(Some(results))) => results,
            Ok(Ok(None)) => {
                warn!("web search pool closed");
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "web search task failed");
                Vec::new()
            }
            Err(_) => {
                task.abort();
                warn!(timeout = ?self.options.web_timeout, "web search timed out");
                Vec::new()
            }
        }
    }
}
