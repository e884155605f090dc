use ragforge_llm::LlmProvider;

use crate::markdown;
use crate::splitter::TextSplitter;
use crate::summarizer::ImageSummarizer;
use crate::types::{ParsedDocument, SourceText, TextKind, VisualKind};

/// Turns parsed documents into the ordered list of texts to embed.
#[derive(Debug, Clone)]
pub struct TextCollector<P> {
    splitter: TextSplitter,
    summarizer: ImageSummarizer<P>,
}

impl<P: LlmProvider> TextCollector<P> {
    #[must_use]
    pub fn new(splitter: TextSplitter, summarizer: ImageSummarizer<P>) -> Self {
        Self {
            splitter,
            summarizer,
        }
    }

    /// For each document (sorted by id): markdown chunks, then picture
    /// summaries, then table summaries. Failed summaries are left out.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a markdown file or image folder cannot be read,
    /// or a summary cannot be written.
    pub async fn collect(&self, documents: &[ParsedDocument]) -> std::io::Result<Vec<SourceText>> {
        let mut sorted: Vec<&ParsedDocument> = documents.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut texts = Vec::new();
        for doc in sorted {
            let before = texts.len();
            let elements = markdown::load_elements(&doc.markdown_path).await?;
            texts.extend(
                self.splitter
                    .split_elements(&elements)
                    .into_iter()
                    .map(|c| SourceText::new(c.text, Some(doc.id.clone()), TextKind::Chunk)),
            );

            for kind in [VisualKind::Picture, VisualKind::Table] {
                let report = self
                    .summarizer
                    .summarize_folder(&doc.visual_dir(kind))
                    .await?;
                texts.extend(
                    report
                        .successful_summaries()
                        .into_iter()
                        .map(|s| SourceText::new(s, Some(doc.id.clone()), kind.into())),
                );
            }

            tracing::info!(document_id = %doc.id, texts = texts.len() - before, "collected texts");
        }
        Ok(texts)
    }
}
