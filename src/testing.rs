//! In-process fakes for the service traits, shared by unit and integration
//! tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use ragbot_core::embedding::Embedder;
use ragbot_core::models::WebSnippet;
use ragbot_core::services::{Generator, SamplingParams, WebSearcher};

/// Deterministic bag-of-words embedder: each lowercase word is hashed into
/// one of `dims` buckets.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % self.dims as u64) as usize] += 1.0;
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Generator that echoes the prompt and records every call.
#[derive(Default)]
pub struct EchoGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl EchoGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn summarize(&self, prompt: &str, _sampling: &SamplingParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(format!("summary of: {}", prompt))
    }
}

/// Web searcher returning a fixed list.
#[derive(Default)]
pub struct StaticSearcher {
    pub results: Vec<WebSnippet>,
    calls: AtomicUsize,
}

impl StaticSearcher {
    pub fn new(results: Vec<WebSnippet>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearcher for StaticSearcher {
    async fn search(&self, _query: &str, num_results: usize) -> Vec<WebSnippet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.iter().take(num_results).cloned().collect()
    }
}
