//! Bulk extraction and indexing.
//!
//! Extraction fans out one task per file on a [`JoinSet`], bounded by a
//! semaphore of `ingest.workers` permits. A file that fails to extract is
//! logged and skipped; everything that succeeded is indexed in one batch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use ragbot_core::models::TextUnit;

use crate::extract::Extractor;
use crate::index::IndexStore;

/// Outcome of one bulk ingest.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub indexed: usize,
    /// Files skipped, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Extracts every path with at most `workers` extractions in flight.
///
/// Units come back in the order of `paths`.
pub async fn extract_all(
    paths: &[PathBuf],
    workers: usize,
    extractor: &Extractor,
) -> (Vec<TextUnit>, Vec<(PathBuf, String)>) {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for (position, path) in paths.iter().cloned().enumerate() {
        let permits = Arc::clone(&permits);
        let extractor = extractor.clone();
        tasks.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => extractor.extract(&path).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            (position, path, outcome)
        });
    }

    let mut done = Vec::with_capacity(paths.len());
    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, _, Ok(unit))) => done.push((position, unit)),
            Ok((_, path, Err(reason))) => {
                warn!(path = %path.display(), error = %reason, "skipping file");
                failed.push((path, reason));
            }
            Err(e) => warn!(error = %e, "extraction task panicked"),
        }
    }

    done.sort_by_key(|(position, _)| *position);
    (done.into_iter().map(|(_, unit)| unit).collect(), failed)
}

/// Extracts and indexes `paths`.
pub async fn index_files(
    paths: &[PathBuf],
    workers: usize,
    extractor: &Extractor,
    index: &IndexStore,
) -> Result<IngestReport> {
    let (units, failed) = extract_all(paths, workers, extractor).await;
    let indexed = index.index(&units).await?;
    info!(
        files = paths.len(),
        indexed,
        failed = failed.len(),
        "ingest complete"
    );
    Ok(IngestReport { indexed, failed })
}
