//! Google Custom Search with a per-process call quota.
//!
//! Web results are supplementary: every failure (missing credentials,
//! exhausted quota, HTTP or decode errors) yields an empty list and a log
//! line, never an error.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use ragbot_core::models::WebSnippet;
use ragbot_core::services::WebSearcher;

use crate::config::WebSearchConfig;

/// Google returns at most 10 results per request.
const MAX_RESULTS_PER_CALL: usize = 10;

pub struct GoogleSearch {
    endpoint: String,
    api_key: Option<String>,
    engine_id: Option<String>,
    max_calls: u32,
    calls: AtomicU32,
    client: reqwest::Client,
}

impl GoogleSearch {
    /// Reads credentials from the environment variables named in `config`.
    pub fn from_config(config: &WebSearchConfig) -> Result<Self> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self::new(
            &config.endpoint,
            read(&config.api_key_env),
            read(&config.engine_id_env),
            config.max_calls,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        engine_id: Option<String>,
        max_calls: u32,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.is_none() || engine_id.is_none() {
            warn!("web search credentials not set; web results will be empty");
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key,
            engine_id,
            max_calls,
            calls: AtomicU32::new(0),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Network calls made (or attempted) so far.
    pub fn calls_made(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Claims one call slot. Concurrent callers can never exceed the quota.
    fn reserve_call(&self) -> bool {
        self.calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_calls).then_some(n + 1)
            })
            .is_ok()
    }

    async fn fetch(&self, key: &str, cx: &str, query: &str, num: usize) -> Result<Vec<WebSnippet>> {
        let num = num.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", num.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("web search returned {}", response.status());
        }

        let payload: Value = response.json().await?;
        Ok(parse_items(&payload))
    }
}

/// Converts the `items` array of a Custom Search response.
pub fn parse_items(payload: &Value) -> Vec<WebSnippet> {
    let Some(items) = payload.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    let field = |item: &Value, name: &str| {
        item.get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    items
        .iter()
        .map(|item| WebSnippet {
            title: field(item, "title"),
            snippet: field(item, "snippet"),
            link: field(item, "link"),
        })
        .filter(|s| !s.title.is_empty() || !s.link.is_empty())
        .collect()
}

#[async_trait]
impl WebSearcher for GoogleSearch {
    async fn search(&self, query: &str, num_results: usize) -> Vec<WebSnippet> {
        let (Some(key), Some(cx)) = (self.api_key.as_deref(), self.engine_id.as_deref()) else {
            debug!("skipping web search: no credentials");
            return Vec::new();
        };

        if !self.reserve_call() {
            warn!(max_calls = self.max_calls, "web search quota exhausted");
            return Vec::new();
        }

        let num = num_results.clamp(1, MAX_RESULTS_PER_CALL);
        match self.fetch(key, cx, query, num).await {
            Ok(results) => {
                debug!(results = results.len(), "web search complete");
                results
            }
            Err(e) => {
                warn!(error = %e, "web search failed");
                Vec::new()
            }
        }
    }
}
