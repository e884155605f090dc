//! Download per-document file sets from an object store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;

use crate::types::DocumentId;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid document id: {0:?}")]
    InvalidId(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Local directory already populated; nothing was listed or downloaded.
    Skipped,
    Downloaded { files: Vec<PathBuf> },
    /// No remote objects under the id prefix.
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub outcomes: Vec<(DocumentId, FetchOutcome)>,
}

impl FetchReport {
    #[must_use]
    pub fn downloaded_files(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                FetchOutcome::Downloaded { files } => files.len(),
                FetchOutcome::Skipped | FetchOutcome::Empty => 0,
            })
            .sum()
    }
}

pub struct ObjectStoreFetcher {
    store: Arc<dyn ObjectStore>,
    download_dir: PathBuf,
}

impl std::fmt::Debug for ObjectStoreFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreFetcher")
            .field("store", &self.store.to_string())
            .field("download_dir", &self.download_dir)
            .finish()
    }
}

impl ObjectStoreFetcher {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            download_dir: download_dir.into(),
        }
    }

    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Fetch every id in order. The first error aborts the run.
    ///
    /// # Errors
    ///
    /// Returns an error on an empty id, a listing or download failure, or a
    /// local write failure.
    pub async fn fetch_all(&self, ids: &[String]) -> Result<FetchReport, FetchError> {
        let mut report = FetchReport::default();
        for raw in ids {
            let id = DocumentId::new(raw).ok_or_else(|| FetchError::InvalidId(raw.clone()))?;
            let outcome = self.fetch(&id).await.inspect_err(|e| {
                tracing::error!(document_id = %id, "fetch failed: {e}");
            })?;
            report.outcomes.push((id, outcome));
        }
        tracing::info!(
            documents = report.outcomes.len(),
            files = report.downloaded_files(),
            "fetch complete"
        );
        Ok(report)
    }

    /// Fetch a single document unless its local directory already has content.
    ///
    /// # Errors
    ///
    /// Returns an error if listing, downloading or writing fails.
    pub async fn fetch(&self, id: &DocumentId) -> Result<FetchOutcome, FetchError> {
        let local_dir = self.download_dir.join(id.as_str());
        if dir_has_entries(&local_dir).await? {
            tracing::info!(document_id = %id, "already downloaded, skipping");
            return Ok(FetchOutcome::Skipped);
        }

        let prefix = ObjectPath::from(id.as_str());
        let mut objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;
        if objects.is_empty() {
            tracing::warn!(document_id = %id, "no objects found under prefix");
            return Ok(FetchOutcome::Empty);
        }
        objects.sort_by(|a, b| a.location.cmp(&b.location));

        let mut files = Vec::with_capacity(objects.len());
        for meta in objects {
            let dest = local_path(&self.download_dir, &meta.location);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let bytes = self.store.get(&meta.location).await?.bytes().await?;
            tokio::fs::write(&dest, &bytes).await?;
            tracing::debug!(key = %meta.location, bytes = bytes.len(), "downloaded object");
            files.push(dest);
        }

        tracing::info!(document_id = %id, files = files.len(), "downloaded document");
        Ok(FetchOutcome::Downloaded { files })
    }
}

async fn dir_has_entries(dir: &Path) -> std::io::Result<bool> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn local_path(root: &Path, location: &ObjectPath) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in location.parts() {
        path.push(part.as_ref());
    }
    path
}
