//! Summary generation through Ollama's streaming `/api/generate`.
//!
//! Ollama streams newline-delimited JSON objects, each carrying a
//! `response` fragment; the last one has `"done": true`. Network chunks
//! do not align with lines, so [`TokenAccumulator`] buffers partial lines
//! between chunks.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;

use ragbot_core::services::{Generator, SamplingParams};

use crate::config::GeneratorConfig;

/// One NDJSON line of a streaming generate response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Reassembles streamed fragments into the final text.
#[derive(Debug, Default)]
pub struct TokenAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl TokenAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network chunk. Complete lines are parsed; a trailing
    /// partial line is kept for the next chunk. Lines after `done` are
    /// ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line)?;
        }
        Ok(())
    }

    /// Flushes any unterminated final line and returns the trimmed text.
    pub fn finish(mut self) -> Result<String> {
        let rest = std::mem::take(&mut self.pending);
        self.consume_line(&rest)?;
        Ok(self.text.trim().to_string())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<()> {
        if self.done {
            return Ok(());
        }
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let chunk: GenerateChunk =
            serde_json::from_str(line).with_context(|| format!("malformed stream line: {}", line))?;
        if let Some(err) = chunk.error {
            bail!("generator error: {}", err);
        }
        self.text.push_str(&chunk.response);
        if chunk.done {
            self.done = true;
        }
        Ok(())
    }
}

pub struct OllamaGenerator {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn summarize(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
            "options": {
                "num_predict": sampling.max_tokens,
                "temperature": sampling.temperature,
                "top_p": sampling.top_p,
            },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("generator unreachable at {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("generator returned {}: {}", status, text);
        }

        let mut acc = TokenAccumulator::new();
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let bytes = item.context("generator stream interrupted")?;
            acc.push(&bytes)?;
            if acc.is_done() {
                break;
            }
        }

        let text = acc.finish()?;
        tracing::debug!(model = %self.model, chars = text.len(), "generated summary");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_fragments_split_across_chunks() {
        let mut acc = TokenAccumulator::new();
        acc.push(b"{\"response\":\" The files\",\"done\":fa").unwrap();
        acc.push(b"lse}\n{\"response\":\" cover grades\"").unwrap();
        acc.push(b",\"done\":false}\n").unwrap();
        acc.push(b"{\"response\":\".\",\"done\":true}\n").unwrap();
        assert!(acc.is_done());
        assert_eq!(acc.finish().unwrap(), "The files cover grades.");
    }

    #[test]
    fn ignores_lines_after_done() {
        let mut acc = TokenAccumulator::new();
        acc.push(b"{\"response\":\"a\",\"done\":true}\n{\"response\":\"b\"}\n")
            .unwrap();
        assert_eq!(acc.finish().unwrap(), "a");
    }

    #[test]
    fn flushes_unterminated_final_line() {
        let mut acc = TokenAccumulator::new();
        acc.push(b"{\"response\":\"tail \",\"done\":true}").unwrap();
        assert!(!acc.is_done());
        assert_eq!(acc.finish().unwrap(), "tail");
    }

    #[test]
    fn surfaces_stream_errors() {
        let mut acc = TokenAccumulator::new();
        let err = acc
            .push(b"{\"error\":\"model 'x' not found\"}\n")
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn rejects_malformed_lines() {
        let mut acc = TokenAccumulator::new();
        assert!(acc.push(b"not json\n").is_err());
    }

    #[tokio::test]
    async fn unreachable_generator_errors() {
        let config = GeneratorConfig {
            url: "http://127.0.0.1:9/api/generate".to_string(),
            timeout_secs: 2,
            ..GeneratorConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        let err = generator
            .summarize("hello", &SamplingParams::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }
}
