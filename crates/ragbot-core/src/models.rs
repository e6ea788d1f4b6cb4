//! Core data models shared by the extractor, index, and orchestrator.
//!
//! A [`TextUnit`] is the normalized output of extracting one file. It is
//! tagged with a [`SourceKind`] that drives filtering and per-kind
//! deduplication at query time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Category of the file a [`TextUnit`] was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Docx,
    Csv,
    Image,
    Video,
}

/// Every kind, in the order the overview prompt lists them.
pub const ALL_KINDS: [SourceKind; 5] = [
    SourceKind::Pdf,
    SourceKind::Docx,
    SourceKind::Csv,
    SourceKind::Image,
    SourceKind::Video,
];

/// Label used in the prompt's source list when web snippets were merged.
pub const WEB_SOURCE_LABEL: &str = "web";

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Docx => "docx",
            SourceKind::Csv => "csv",
            SourceKind::Image => "image",
            SourceKind::Video => "video",
        }
    }

    /// Maps a file extension (without the dot, any case) to its kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "docx" => Some(SourceKind::Docx),
            "csv" => Some(SourceKind::Csv),
            "jpg" | "jpeg" | "png" => Some(SourceKind::Image),
            "mp4" | "avi" | "mov" => Some(SourceKind::Video),
            _ => None,
        }
    }

    /// Maps a path to its kind by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known source kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for SourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(SourceKind::Pdf),
            "docx" => Ok(SourceKind::Docx),
            "csv" => Ok(SourceKind::Csv),
            "image" => Ok(SourceKind::Image),
            "video" => Ok(SourceKind::Video),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Normalized text extracted from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    pub content: String,
    pub source_kind: SourceKind,
    /// File identifier, e.g. `resume.docx`.
    pub source_id: String,
}

impl TextUnit {
    pub fn new(
        content: impl Into<String>,
        source_kind: SourceKind,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            source_kind,
            source_id: source_id.into(),
        }
    }
}

/// A [`TextUnit`] returned from similarity search, with its score.
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: TextUnit,
    /// Cosine similarity to the query embedding.
    pub score: f64,
}

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSnippet {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

impl fmt::Display for WebSnippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Web: {} - {} from {}", self.title, self.snippet, self.link)
    }
}

/// Scope of a query: everything, one source kind, or one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFilter {
    All,
    Kind(SourceKind),
    File(String),
}

/// Sentinel scope meaning "no filter".
pub const ALL_FILES: &str = "all_files";

impl SourceFilter {
    /// Interprets a request scope string.
    ///
    /// Empty and `all_files` mean [`SourceFilter::All`]; a kind name such as
    /// `pdf` selects that kind; anything else names a file.
    pub fn parse(scope: &str) -> Self {
        let scope = scope.trim();
        if scope.is_empty() || scope == ALL_FILES {
            return SourceFilter::All;
        }
        match scope.parse::<SourceKind>() {
            Ok(kind) => SourceFilter::Kind(kind),
            Err(_) => SourceFilter::File(scope.to_string()),
        }
    }

    /// The scope component of the cache key.
    pub fn label(&self) -> &str {
        match self {
            SourceFilter::All => ALL_FILES,
            SourceFilter::Kind(kind) => kind.as_str(),
            SourceFilter::File(name) => name,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SourceFilter::All)
    }

    /// Whether a unit belongs to this scope.
    pub fn matches(&self, unit: &TextUnit) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Kind(kind) => unit.source_kind == *kind,
            SourceFilter::File(name) => unit.source_id == *name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_dispatch_is_case_insensitive() {
        assert_eq!(SourceKind::from_extension("PDF"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_extension("JpEg"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_extension("mov"), Some(SourceKind::Video));
        assert_eq!(SourceKind::from_extension("txt"), None);
        assert_eq!(
            SourceKind::from_path(Path::new("data/videos/dog_flipped.mp4")),
            Some(SourceKind::Video)
        );
        assert_eq!(SourceKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(SourceFilter::parse(""), SourceFilter::All);
        assert_eq!(SourceFilter::parse("all_files"), SourceFilter::All);
        assert_eq!(
            SourceFilter::parse("csv"),
            SourceFilter::Kind(SourceKind::Csv)
        );
        assert_eq!(
            SourceFilter::parse("resume.docx"),
            SourceFilter::File("resume.docx".to_string())
        );
        assert_eq!(SourceFilter::All.label(), "all_files");
    }

    #[test]
    fn file_filter_matches_by_source_id() {
        let unit = TextUnit::new("hello", SourceKind::Docx, "resume.docx");
        assert!(SourceFilter::File("resume.docx".into()).matches(&unit));
        assert!(!SourceFilter::File("other.docx".into()).matches(&unit));
        assert!(SourceFilter::Kind(SourceKind::Docx).matches(&unit));
        assert!(!SourceFilter::Kind(SourceKind::Pdf).matches(&unit));
    }

    #[test]
    fn snippet_display() {
        let s = WebSnippet {
            title: "Rust".into(),
            snippet: "A language".into(),
            link: "https://rust-lang.org".into(),
        };
        assert_eq!(
            s.to_string(),
            "Web: Rust - A language from https://rust-lang.org"
        );
    }
}
