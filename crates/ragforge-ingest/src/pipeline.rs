use ragforge_llm::LlmProvider;

use crate::collector::TextCollector;
use crate::error::IngestError;
use crate::fetcher::{FetchReport, ObjectStoreFetcher};
use crate::parser::DocumentParser;
use crate::publisher::{IndexPublisher, PublishReport};
use crate::types::DocumentId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub fetch: FetchReport,
    pub documents: usize,
    pub publish: PublishReport,
}

/// fetch -> parse the requested documents -> collect texts -> one publish.
#[derive(Debug)]
pub struct IngestionPipeline<P> {
    fetcher: ObjectStoreFetcher,
    parser: DocumentParser,
    collector: TextCollector<P>,
    publisher: IndexPublisher<P>,
}

impl<P: LlmProvider> IngestionPipeline<P> {
    #[must_use]
    pub fn new(
        fetcher: ObjectStoreFetcher,
        parser: DocumentParser,
        collector: TextCollector<P>,
        publisher: IndexPublisher<P>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            collector,
            publisher,
        }
    }

    /// Run every stage in sequence for `document_ids` only. Other directories
    /// under the download root are left alone, and documents parsed by an
    /// earlier run are reused. Any stage error aborts the run.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, parse, collect or publish error.
    pub async fn run(&self, document_ids: &[String]) -> Result<IngestReport, IngestError> {
        let fetch = self.fetcher.fetch_all(document_ids).await?;
        let mut ids: Vec<DocumentId> = Vec::with_capacity(fetch.outcomes.len());
        for (id, _) in &fetch.outcomes {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        let parsed = self
            .parser
            .parse_documents(self.fetcher.download_dir(), &ids)
            .await?;
        tracing::info!(documents = parsed.len(), "parsed documents");

        let texts = self.collector.collect(&parsed).await?;
        let publish = self.publisher.publish(&texts).await?;

        Ok(IngestReport {
            fetch,
            documents: parsed.len(),
            publish,
        })
    }
}
