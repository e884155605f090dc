//! Retrieval-oriented summaries of table and picture images.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use ragforge_llm::{LlmError, LlmProvider, Message};

use crate::types::is_hidden;

pub const SUMMARY_PROMPT: &str = "You are an assistant tasked with summarizing images for retrieval via RAGs. \
These summaries will be embedded and used to retrieve the raw image via RAGs. \
Give a concise summary of the image that is well optimized for retrieval via RAGs.";

/// Default maximum image size: 20 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

pub const SUMMARIES_DIR: &str = "summaries";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Encode,
    Summarize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summarized {
        image: String,
        summary: String,
        path: PathBuf,
    },
    Failed {
        image: String,
        stage: FailureStage,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub outcomes: Vec<SummaryOutcome>,
}

impl SummaryReport {
    /// One string per image, with failures rendered as
    /// `Failed to encode image: {file}` / `Failed to summarize image: {file}`.
    #[must_use]
    pub fn summary_list(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|o| match o {
                SummaryOutcome::Summarized { summary, .. } => summary.clone(),
                SummaryOutcome::Failed {
                    image,
                    stage: FailureStage::Encode,
                    ..
                } => format!("Failed to encode image: {image}"),
                SummaryOutcome::Failed {
                    image,
                    stage: FailureStage::Summarize,
                    ..
                } => format!("Failed to summarize image: {image}"),
            })
            .collect()
    }

    #[must_use]
    pub fn successful_summaries(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                SummaryOutcome::Summarized { summary, .. } => Some(summary.as_str()),
                SummaryOutcome::Failed { .. } => None,
            })
            .collect()
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SummaryOutcome::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ImageSummarizer<P> {
    provider: P,
    max_image_bytes: u64,
}

impl<P: LlmProvider> ImageSummarizer<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_image_bytes(mut self, max_image_bytes: u64) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Summarize every visible file in `folder`, in name order.
    ///
    /// Per-image failures are recorded in the report. Summaries are written
    /// to `{folder}/summaries/{stem}_summary.txt`, and an image that already
    /// has one is not sent to the provider again. A missing folder yields an
    /// empty report.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the folder cannot be listed or a summary cannot
    /// be written.
    pub async fn summarize_folder(&self, folder: &Path) -> std::io::Result<SummaryReport> {
        let images = match list_images(folder) {
            Ok(images) => images,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(folder = %folder.display(), "no image folder");
                return Ok(SummaryReport::default());
            }
            Err(e) => return Err(e),
        };

        let mut report = SummaryReport::default();
        if images.is_empty() {
            return Ok(report);
        }
        let summaries_dir = folder.join(SUMMARIES_DIR);
        tokio::fs::create_dir_all(&summaries_dir).await?;

        for path in images {
            let outcome = self.summarize_image(&path, &summaries_dir).await?;
            report.outcomes.push(outcome);
        }

        tracing::info!(
            folder = %folder.display(),
            images = report.outcomes.len(),
            failures = report.failures(),
            "summarized images"
        );
        Ok(report)
    }

    async fn summarize_image(
        &self,
        path: &Path,
        summaries_dir: &Path,
    ) -> std::io::Result<SummaryOutcome> {
        let image = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let summary_path = summaries_dir.join(format!("{stem}_summary.txt"));

        if tokio::fs::try_exists(&summary_path).await? {
            let summary = tokio::fs::read_to_string(&summary_path).await?;
            tracing::debug!(%image, "reusing saved summary");
            return Ok(SummaryOutcome::Summarized {
                image,
                summary,
                path: summary_path,
            });
        }

        let encoded = match self.encode(path).await {
            Ok(encoded) => encoded,
            Err(reason) => {
                tracing::warn!(%image, "failed to encode image: {reason}");
                return Ok(SummaryOutcome::Failed {
                    image,
                    stage: FailureStage::Encode,
                    reason,
                });
            }
        };

        if !self.provider.supports_vision() {
            let reason = LlmError::VisionUnsupported {
                provider: self.provider.name().to_owned(),
            }
            .to_string();
            tracing::warn!(%image, "failed to summarize image: {reason}");
            return Ok(SummaryOutcome::Failed {
                image,
                stage: FailureStage::Summarize,
                reason,
            });
        }

        let message = Message::with_image(SUMMARY_PROMPT, encoded, mime_type(path));
        let summary = match self.provider.chat(&[message]).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(%image, provider = self.provider.name(), "failed to summarize image: {e}");
                return Ok(SummaryOutcome::Failed {
                    image,
                    stage: FailureStage::Summarize,
                    reason: e.to_string(),
                });
            }
        };

        tokio::fs::write(&summary_path, &summary).await?;
        tracing::debug!(%image, path = %summary_path.display(), "saved summary");

        Ok(SummaryOutcome::Summarized {
            image,
            summary,
            path: summary_path,
        })
    }

    async fn encode(&self, path: &Path) -> Result<String, String> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| e.to_string())?;
        if meta.len() > self.max_image_bytes {
            return Err(format!(
                "{} bytes exceeds limit of {}",
                meta.len(),
                self.max_image_bytes
            ));
        }
        let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// Visible non-directory entries, sorted by name. Broken links are kept so
/// they surface as encode failures.
fn list_images(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if is_hidden(&path) || entry.file_type()?.is_dir() {
            continue;
        }
        images.push(path);
    }
    images.sort();
    Ok(images)
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
