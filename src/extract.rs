//! Per-format text extraction.
//!
//! [`Extractor::extract`] turns one file into one [`TextUnit`] tagged with
//! its [`SourceKind`] and file name. Document formats are parsed on the
//! blocking pool; images and videos go through the [`media`](crate::media)
//! backends and never fail on OCR or captioning errors.
//!
//! | Extension | Kind | Text |
//! |-----------|------|------|
//! | `.pdf` | pdf | text of every page |
//! | `.docx` | docx | non-empty paragraphs joined by a space |
//! | `.csv` | csv | data rows (header skipped), fields and rows space-joined |
//! | `.jpg` `.jpeg` `.png` | image | `OCR: …\nCaption: …` |
//! | `.mp4` `.avi` `.mov` | video | one labelled line pair per sampled frame |

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use ragbot_core::models::{SourceKind, TextUnit};

use crate::media::{self, MediaBackends};

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("CSV extraction failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Extracts files of every supported kind.
#[derive(Clone)]
pub struct Extractor {
    media: Arc<MediaBackends>,
}

impl Extractor {
    pub fn new(media: Arc<MediaBackends>) -> Self {
        Self { media }
    }

    /// Extracts `path` into a single text unit identified by its file name.
    pub async fn extract(&self, path: &Path) -> Result<TextUnit, ExtractError> {
        let kind = SourceKind::from_path(path)
            .ok_or_else(|| ExtractError::UnsupportedType(path.display().to_string()))?;
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let content = match kind {
            SourceKind::Pdf | SourceKind::Docx | SourceKind::Csv => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| ExtractError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?;
                tokio::task::spawn_blocking(move || extract_document(kind, &bytes)).await??
            }
            SourceKind::Image => {
                ensure_readable(path).await?;
                media::describe_image(path, self.media.ocr.as_ref(), self.media.captioner.as_ref())
                    .await
            }
            SourceKind::Video => {
                ensure_readable(path).await?;
                media::describe_video(
                    path,
                    self.media.frame_interval_secs,
                    self.media.sampler.as_ref(),
                    self.media.ocr.as_ref(),
                    self.media.captioner.as_ref(),
                )
                .await
            }
        };

        tracing::debug!(source_id = %source_id, kind = %kind, chars = content.len(), "extracted");
        Ok(TextUnit::new(content, kind, source_id))
    }
}

/// Media backends degrade instead of failing, so a missing file is caught
/// up front.
async fn ensure_readable(path: &Path) -> Result<(), ExtractError> {
    tokio::fs::metadata(path)
        .await
        .map(|_| ())
        .map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Extracts text from an in-memory document of a document kind.
pub fn extract_document(kind: SourceKind, bytes: &[u8]) -> Result<String, ExtractError> {
    match kind {
        SourceKind::Pdf => extract_pdf(bytes),
        SourceKind::Docx => extract_docx(bytes),
        SourceKind::Csv => extract_csv(bytes),
        other => Err(ExtractError::UnsupportedType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    Ok(docx_paragraphs(&doc_xml)?.join(" "))
}

/// Text of each non-empty `<w:p>`, runs concatenated.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }
    Ok(paragraphs)
}

fn extract_csv(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().collect::<Vec<_>>().join(" "));
    }
    Ok(rows.join(" "))
}
