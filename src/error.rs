//! Typed errors for the query and upload paths.
//!
//! The HTTP layer maps these onto status codes; see
//! [`server`](crate::server).

use std::fmt;

use thiserror::Error;

/// Dependency that failed while answering a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cache,
    Embedding,
    VectorStore,
    Generator,
    /// Reserved: web search degrades to no results instead of failing.
    WebSearch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Cache => "cache",
            Stage::Embedding => "embedding",
            Stage::VectorStore => "vector store",
            Stage::Generator => "generator",
            Stage::WebSearch => "web search",
        })
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query text is empty")]
    EmptyQuery,

    /// Retrieval or filtering left nothing to summarize.
    #[error("No relevant data found for {0}.")]
    NotFound(String),

    #[error("{stage} failed: {source:#}")]
    Upstream {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl QueryError {
    pub fn upstream(stage: Stage) -> impl FnOnce(anyhow::Error) -> QueryError {
        move |source| QueryError::Upstream { stage, source }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file in upload")]
    MissingFile,

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("failed to process {name}: {source:#}")]
    Processing {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
