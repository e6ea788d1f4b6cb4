//! OCR, captioning, and frame sampling for image and video files.
//!
//! Each capability sits behind a trait so the extractor can be exercised
//! without the external tools:
//!
//! | Trait | Default backend |
//! |-------|-----------------|
//! | [`OcrEngine`] | `tesseract <image> stdout` |
//! | [`ImageCaptioner`] | Ollama vision model via `/api/generate` |
//! | [`FrameSampler`] | `ffmpeg -vf fps=1/<interval>` into a temp dir |
//!
//! OCR and captioning never fail the extraction: a failure becomes
//! [`MediaText::Degraded`], rendered inline as `"<label> failed: <reason>"`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::MediaConfig;

const NO_TEXT_DETECTED: &str = "No text detected in image.";
const NO_FRAMES: &str = "No frames extracted from video.";
const CAPTION_PROMPT: &str = "Describe this image in one short sentence.";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Outcome of an OCR or captioning step.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaText {
    Ok(String),
    Degraded(String),
}

impl MediaText {
    /// Renders the text, or `"<label> failed: <reason>"` when degraded.
    pub fn render(&self, label: &str) -> String {
        match self {
            MediaText::Ok(text) => text.clone(),
            MediaText::Degraded(reason) => format!("{} failed: {}", label, reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MediaText::Degraded(_))
    }
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Raw recognized text of the image.
    async fn recognize(&self, image: &Path) -> Result<String, MediaError>;
}

#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    async fn caption(&self, image: &Path) -> Result<String, MediaError>;
}

/// Frames sampled from a video. The backing directory, and every frame in
/// it, is removed when the set is dropped.
pub struct FrameSet {
    _dir: TempDir,
    frames: Vec<PathBuf>,
}

impl FrameSet {
    pub fn new(dir: TempDir, frames: Vec<PathBuf>) -> Self {
        Self { _dir: dir, frames }
    }

    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }
}

#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Extracts one frame every `interval_secs` seconds.
    async fn sample(&self, video: &Path, interval_secs: u64) -> Result<FrameSet, MediaError>;
}

// ============ Rendering ============

/// OCR with the legacy empty-text placeholder.
pub async fn ocr_text(ocr: &dyn OcrEngine, image: &Path) -> MediaText {
    match ocr.recognize(image).await {
        Ok(text) if text.trim().is_empty() => MediaText::Ok(NO_TEXT_DETECTED.to_string()),
        Ok(text) => MediaText::Ok(text.trim().to_string()),
        Err(e) => {
            warn!(image = %image.display(), error = %e, "OCR degraded");
            MediaText::Degraded(e.to_string())
        }
    }
}

pub async fn caption_text(captioner: &dyn ImageCaptioner, image: &Path) -> MediaText {
    match captioner.caption(image).await {
        Ok(caption) => MediaText::Ok(caption.trim().to_string()),
        Err(e) => {
            warn!(image = %image.display(), error = %e, "captioning degraded");
            MediaText::Degraded(e.to_string())
        }
    }
}

/// `"OCR: <ocr>\nCaption: <caption>"` for one image.
pub async fn describe_image(
    image: &Path,
    ocr: &dyn OcrEngine,
    captioner: &dyn ImageCaptioner,
) -> String {
    let ocr = ocr_text(ocr, image).await;
    let caption = caption_text(captioner, image).await;
    format!("OCR: {}\nCaption: {}", ocr.render("OCR"), caption.render("Captioning"))
}

/// Per-frame OCR and captions, each labelled with its elapsed time.
///
/// Sampling failures yield the "no frames" placeholder. The frame set is
/// dropped, and its files removed, before this returns.
pub async fn describe_video(
    video: &Path,
    interval_secs: u64,
    sampler: &dyn FrameSampler,
    ocr: &dyn OcrEngine,
    captioner: &dyn ImageCaptioner,
) -> String {
    let frame_set = match sampler.sample(video, interval_secs).await {
        Ok(set) => set,
        Err(e) => {
            warn!(video = %video.display(), error = %e, "frame extraction failed");
            return NO_FRAMES.to_string();
        }
    };

    if frame_set.frames().is_empty() {
        return NO_FRAMES.to_string();
    }

    let mut parts = Vec::with_capacity(frame_set.frames().len());
    for (i, frame) in frame_set.frames().iter().enumerate() {
        let body = describe_image(frame, ocr, captioner).await;
        parts.push(format!(
            "Frame {} (at {}s): {}",
            i + 1,
            i as u64 * interval_secs,
            body
        ));
    }
    drop(frame_set);

    parts.join("\n")
}

// ============ Backends ============

/// Runs the `tesseract` CLI.
pub struct TesseractOcr {
    command: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<String, MediaError> {
        let output = Command::new(&self.command)
            .arg(image)
            .arg("stdout")
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::CommandFailed {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Captions images with an Ollama vision model (e.g. `llava`).
pub struct OllamaCaptioner {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaCaptioner {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            url: url.into(),
            model: model.into(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl ImageCaptioner for OllamaCaptioner {
    async fn caption(&self, image: &Path) -> Result<String, MediaError> {
        let bytes = tokio::fs::read(image).await?;
        let body = serde_json::json!({
            "model": self.model,
            "prompt": CAPTION_PROMPT,
            "images": [base64::engine::general_purpose::STANDARD.encode(&bytes)],
            "stream": false,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let json: serde_json::Value = response.json().await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| MediaError::Decode("missing `response` field".to_string()))
    }
}

/// Samples frames with the `ffmpeg` CLI.
pub struct FfmpegSampler {
    command: String,
}

impl FfmpegSampler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl FrameSampler for FfmpegSampler {
    async fn sample(&self, video: &Path, interval_secs: u64) -> Result<FrameSet, MediaError> {
        let dir = tempfile::Builder::new().prefix("ragbot-frames-").tempdir()?;
        let pattern = dir.path().join("frame_%05d.jpg");

        let output = Command::new(&self.command)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(video)
            .arg("-vf")
            .arg(format!("fps=1/{}", interval_secs.max(1)))
            .arg(&pattern)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::CommandFailed {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut frames = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jpg") {
                frames.push(path);
            }
        }
        frames.sort();
        debug!(video = %video.display(), frames = frames.len(), "sampled video frames");

        Ok(FrameSet::new(dir, frames))
    }
}

/// The three media backends bundled for the extractor.
pub struct MediaBackends {
    pub ocr: Box<dyn OcrEngine>,
    pub captioner: Box<dyn ImageCaptioner>,
    pub sampler: Box<dyn FrameSampler>,
    pub frame_interval_secs: u64,
}

impl MediaBackends {
    pub fn from_config(config: &MediaConfig) -> anyhow::Result<Self> {
        Ok(Self {
            ocr: Box::new(TesseractOcr::new(&config.ocr_command)),
            captioner: Box::new(OllamaCaptioner::new(
                &config.caption_url,
                &config.caption_model,
                Duration::from_secs(config.caption_timeout_secs),
            )?),
            sampler: Box::new(FfmpegSampler::new(&config.ffmpeg_command)),
            frame_interval_secs: config.frame_interval_secs,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;

    #[tokio::test]
    async fn image_description_has_labelled_sections() {
        let text = describe_image(
            Path::new("dog.jpeg"),
            &FixedOcr("  GOOD DOG \n"),
            &FixedCaptioner("a dog on a lawn"),
        )
        .await;
        assert_eq!(text, "OCR: GOOD DOG\nCaption: a dog on a lawn");
    }

    #[tokio::test]
    async fn blank_ocr_uses_placeholder() {
        let text = describe_image(Path::new("x.png"), &FixedOcr(" \n"), &FixedCaptioner("c")).await;
        assert!(text.starts_with("OCR: No text detected in image.\n"));
    }

    #[tokio::test]
    async fn ocr_failure_is_rendered_inline() {
        let result = ocr_text(&BrokenOcr, Path::new("x.png")).await;
        assert!(result.is_degraded());
        assert_eq!(result.render("OCR"), "OCR failed: unexpected response: engine crashed");
    }

    #[tokio::test]
    async fn video_frames_are_timestamped_and_cleaned_up() {
        let sampler = FakeSampler::new(3);
        let text = describe_video(
            Path::new("clip.mp4"),
            5,
            &sampler,
            &BrokenOcr,
            &FixedCaptioner("a dog"),
        )
        .await;

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Frame 1 (at 0s): OCR: OCR failed:"));
        assert!(lines[2].starts_with("Frame 2 (at 5s): "));
        assert!(lines[4].starts_with("Frame 3 (at 10s): "));
        assert_eq!(lines[5], "Caption: a dog");

        let dir = sampler.last_dir.lock().unwrap().clone().unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn video_without_frames_uses_placeholder() {
        let text = describe_video(
            Path::new("empty.mov"),
            5,
            &FakeSampler::new(0),
            &FixedOcr("x"),
            &FixedCaptioner("y"),
        )
        .await;
        assert_eq!(text, "No frames extracted from video.");
    }

    #[tokio::test]
    async fn missing_ocr_binary_degrades() {
        let ocr = TesseractOcr::new("ragbot-no-such-ocr-binary");
        let result = ocr_text(&ocr, Path::new("x.png")).await;
        assert!(result.is_degraded());
    }
}
