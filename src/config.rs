use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ragbot_core::context::ContextBudget;
use ragbot_core::services::SamplingParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Ollama `/api/generate` endpoint.
    pub url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "mistral:7b-instruct-q4_0".to_string(),
            max_tokens: 50,
            temperature: 0.5,
            top_p: 0.9,
            timeout_secs: 120,
        }
    }
}

impl GeneratorConfig {
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebSearchConfig {
    pub endpoint: String,
    /// Environment variable holding the Google API key.
    pub api_key_env: String,
    /// Environment variable holding the custom search engine id.
    pub engine_id_env: String,
    pub num_results: usize,
    /// Network calls allowed per process lifetime.
    pub max_calls: u32,
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            engine_id_env: "CX_KEY".to_string(),
            num_results: 3,
            max_calls: 10,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub overview_top_k: usize,
    pub segment_chars: usize,
    pub overview_budget: usize,
    pub filtered_budget: usize,
    pub web_snippets: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            overview_top_k: 10,
            segment_chars: 100,
            overview_budget: 1000,
            filtered_budget: 500,
            web_snippets: 2,
        }
    }
}

impl RetrievalConfig {
    pub fn budget(&self) -> ContextBudget {
        ContextBudget {
            segment_chars: self.segment_chars,
            overview_chars: self.overview_budget,
            filtered_chars: self.filtered_budget,
            web_snippets: self.web_snippets,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MediaConfig {
    pub ocr_command: String,
    pub ffmpeg_command: String,
    /// Ollama `/api/generate` endpoint used with a vision model.
    pub caption_url: String,
    pub caption_model: String,
    pub caption_timeout_secs: u64,
    pub frame_interval_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ocr_command: "tesseract".to_string(),
            ffmpeg_command: "ffmpeg".to_string(),
            caption_url: "http://localhost:11434/api/generate".to_string(),
            caption_model: "llava".to_string(),
            caption_timeout_secs: 60,
            frame_interval_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    /// Extraction tasks allowed to run at once.
    pub workers: usize,
    /// Startup corpus, indexed by `ragbot index` and `serve --reindex`.
    pub files: Vec<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            files: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// File names of the configured corpus, in configuration order.
    pub fn file_names(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 || config.retrieval.overview_top_k == 0 {
        anyhow::bail!("retrieval.top_k and retrieval.overview_top_k must be >= 1");
    }

    if config.retrieval.overview_budget == 0 || config.retrieval.filtered_budget == 0 {
        anyhow::bail!("retrieval budgets must be > 0");
    }

    if config.ingest.workers == 0 {
        anyhow::bail!("ingest.workers must be >= 1");
    }

    if config.media.frame_interval_secs == 0 {
        anyhow::bail!("media.frame_interval_secs must be >= 1");
    }

    if !(1..=10).contains(&config.web_search.num_results) {
        anyhow::bail!("web_search.num_results must be in [1, 10]");
    }

    if !(0.0..=2.0).contains(&config.generator.temperature) {
        anyhow::bail!("generator.temperature must be in [0.0, 2.0]");
    }

    if !(0.0..=1.0).contains(&config.generator.top_p) {
        anyhow::bail!("generator.top_p must be in [0.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    Ok(())
}
