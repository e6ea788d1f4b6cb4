//! Uploaded files: name checks, storage, indexing, and the registry.
//!
//! An accepted upload is written to `server.upload_dir`, extracted,
//! indexed under its file name, and recorded in the `uploaded_files` table
//! so `GET /files` can list it after a restart.

use std::path::{Path, PathBuf};

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::{info, warn};

use ragbot_core::models::{SourceKind, TextUnit, ALL_FILES};

use crate::error::UploadError;
use crate::extract::Extractor;
use crate::index::IndexStore;

/// Validates a client-supplied file name and returns it unchanged.
///
/// Names with path separators, a leading dot, control characters, or the
/// reserved `all_files` scope are refused.
pub fn sanitize_file_name(raw: &str) -> Result<String, UploadError> {
    let name = raw.trim();
    let unsafe_name = name.is_empty()
        || name == ALL_FILES
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if unsafe_name {
        return Err(UploadError::InvalidName(raw.to_string()));
    }
    Ok(name.to_string())
}

/// Queryable scopes: `all_files`, then corpus names, then uploads, with
/// duplicates dropped.
pub fn list_scopes(corpus: Vec<String>, uploaded: Vec<String>) -> Vec<String> {
    let mut scopes = vec![ALL_FILES.to_string()];
    for name in corpus.into_iter().chain(uploaded) {
        if !scopes.contains(&name) {
            scopes.push(name);
        }
    }
    scopes
}

/// Persistent list of uploaded file names.
#[derive(Clone)]
pub struct UploadRegistry {
    pool: SqlitePool,
}

impl UploadRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records an upload; re-uploading a name replaces the entry.
    pub async fn register(&self, name: &str, path: &Path) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO uploaded_files (name, path, uploaded_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET path = excluded.path, uploaded_at = excluded.uploaded_at
            "#,
        )
        .bind(name)
        .bind(path.to_string_lossy().as_ref())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Uploaded names, oldest first.
    pub async fn list(&self) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM uploaded_files ORDER BY uploaded_at, name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

/// Handles the full upload path.
pub struct Uploads {
    dir: PathBuf,
    registry: UploadRegistry,
    extractor: Extractor,
    index: IndexStore,
}

impl Uploads {
    pub fn new(
        dir: PathBuf,
        registry: UploadRegistry,
        extractor: Extractor,
        index: IndexStore,
    ) -> Self {
        Self {
            dir,
            registry,
            extractor,
            index,
        }
    }

    pub fn registry(&self) -> &UploadRegistry {
        &self.registry
    }

    /// Saves, extracts, indexes, and registers one upload.
    pub async fn accept(&self, raw_name: &str, bytes: &[u8]) -> Result<TextUnit, UploadError> {
        let name = sanitize_file_name(raw_name)?;
        if SourceKind::from_path(Path::new(&name)).is_none() {
            return Err(UploadError::Unsupported(name));
        }

        let processing = |source: anyhow::Error| UploadError::Processing {
            name: name.clone(),
            source,
        };

        let path = self.dir.join(&name);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))
            .map_err(processing)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
            .map_err(processing)?;

        match self.ingest(&name, &path).await {
            Ok(unit) => {
                info!(
                    name = %name,
                    kind = %unit.source_kind,
                    bytes = bytes.len(),
                    "upload indexed"
                );
                Ok(unit)
            }
            Err(source) => {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to remove rejected upload");
                }
                Err(processing(source))
            }
        }
    }

    async fn ingest(&self, name: &str, path: &Path) -> anyhow::Result<TextUnit> {
        let unit = self.extractor.extract(path).await?;
        self.index.index(std::slice::from_ref(&unit)).await?;
        self.registry.register(name, path).await?;
        Ok(unit)
    }
}
