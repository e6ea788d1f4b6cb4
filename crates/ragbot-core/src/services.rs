//! Traits for the generative model and the web search backend.
//!
//! The orchestrator only sees these traits; HTTP clients for Ollama and
//! Google Custom Search implement them in the app crate, and tests supply
//! in-process fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::WebSnippet;

/// Sampling parameters forwarded to the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 50,
            temperature: 0.5,
            top_p: 0.9,
        }
    }
}

/// Produces a summary for a fully composed prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the generated text with surrounding whitespace removed.
    async fn summarize(&self, prompt: &str, sampling: &SamplingParams) -> Result<String>;
}

/// Fetches short result snippets for a query.
///
/// Implementations never fail: any problem (quota, transport, decoding)
/// yields an empty list.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> Vec<WebSnippet>;
}
