use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use ragforge_ingest::parser::{ConvertedDocument, ConvertedTable, TableCell, TableData};
use ragforge_ingest::{
    BatchEmbedder, DocumentConverter, DocumentParser, FetchOutcome, ImageSummarizer,
    InMemoryVectorStore, IndexPublisher, IngestionPipeline, ObjectStoreFetcher, ParseError,
    PublishMode, PublisherConfig, SplitterConfig, TextCollector, TextSplitter, VectorFilter,
    VectorStore,
};
use ragforge_llm::mock::MockProvider;

const DIM: usize = 3072;

/// Stands in for docling: every PDF yields two tables and three pictures.
#[derive(Default)]
struct StubConverter {
    converted: Mutex<Vec<PathBuf>>,
}

impl StubConverter {
    fn converted(&self) -> Vec<PathBuf> {
        self.converted.lock().unwrap().clone()
    }
}

impl DocumentConverter for StubConverter {
    fn convert(
        &self,
        pdf: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<ConvertedDocument, ParseError>> + Send + '_>> {
        self.converted.lock().unwrap().push(pdf.to_path_buf());
        let name = pdf.file_stem().unwrap().to_string_lossy().into_owned();
        Box::pin(async move {
            let table = |label: &str| ConvertedTable {
                data: TableData {
                    num_rows: 2,
                    num_cols: 1,
                    cells: vec![
                        TableCell {
                            text: "metric".into(),
                            row: 0,
                            col: 0,
                            column_header: true,
                        },
                        TableCell {
                            text: label.into(),
                            row: 1,
                            col: 0,
                            column_header: false,
                        },
                    ],
                },
                image: Some(label.as_bytes().to_vec()),
            };
            Ok(ConvertedDocument {
                markdown: format!("# {name}\n\nBody of {name}."),
                tables: vec![table("t1"), table("t2")],
                pictures: vec![
                    Some(b"p1".to_vec()),
                    Some(b"p2".to_vec()),
                    Some(b"p3".to_vec()),
                ],
            })
        })
    }

    fn name(&self) -> &str {
        "stub"
    }
}

async fn bucket() -> Arc<InMemory> {
    let store = InMemory::new();
    for key in ["a/alpha.pdf", "b/beta.pdf"] {
        store
            .put(&ObjectPath::from(key), PutPayload::from_static(b"%PDF-1.7"))
            .await
            .unwrap();
    }
    Arc::new(store)
}

fn pipeline(
    root: &Path,
    objects: Arc<InMemory>,
    vectors: Arc<InMemoryVectorStore>,
    provider: MockProvider,
    converter: Arc<StubConverter>,
) -> IngestionPipeline<MockProvider> {
    IngestionPipeline::new(
        ObjectStoreFetcher::new(objects, root),
        DocumentParser::new(converter),
        TextCollector::new(
            TextSplitter::new(SplitterConfig::default()),
            ImageSummarizer::new(provider.clone()),
        ),
        IndexPublisher::new(
            vectors,
            provider,
            BatchEmbedder::default(),
            PublisherConfig {
                collection: "docs".into(),
                mode: PublishMode::Replace,
                ready_timeout: Duration::from_secs(1),
                poll_interval: Duration::from_millis(10),
                ..PublisherConfig::default()
            },
        ),
    )
}

#[tokio::test]
async fn end_to_end_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let vectors = Arc::new(InMemoryVectorStore::new());
    let provider = MockProvider::default().with_dimensions(DIM);

    // "a" already present locally: it is parsed but not downloaded again
    std::fs::create_dir_all(dir.path().join("a")).unwrap();
    std::fs::write(dir.path().join("a/alpha.pdf"), b"%PDF-local").unwrap();

    let converter = Arc::new(StubConverter::default());
    let report = pipeline(
        dir.path(),
        bucket().await,
        vectors.clone(),
        provider.clone(),
        converter.clone(),
    )
        .run(&["a".into(), "b".into()])
        .await
        .unwrap();

    assert_eq!(report.fetch.outcomes[0].1, FetchOutcome::Skipped);
    assert!(matches!(
        report.fetch.outcomes[1].1,
        FetchOutcome::Downloaded { .. }
    ));
    assert_eq!(report.documents, 2);
    assert_eq!(converter.converted().len(), 2);

    let parsed = dir.path().join("b/parsed_documents");
    for file in [
        "b.md",
        "tables/table-1.png",
        "tables/table-2.png",
        "images/picture-1.png",
        "images/picture-2.png",
        "images/picture-3.png",
        "csv_files/table-1.csv",
        "csv_files/table-2.csv",
        "images/summaries/picture-3_summary.txt",
        "tables/summaries/table-2_summary.txt",
    ] {
        assert!(parsed.join(file).exists(), "missing {file}");
    }

    // per document: heading + body chunk, 3 picture and 2 table summaries
    assert_eq!(report.publish.ids.len(), 2 * (2 + 3 + 2));
    assert_eq!(vectors.point_count("docs"), Some(14));

    let b_points = vectors
        .scroll("docs", Some(VectorFilter::text_equals("document_id", "b")), 100)
        .await
        .unwrap();
    assert_eq!(b_points.len(), 7);
    assert_eq!(
        b_points
            .iter()
            .filter(|p| p.payload["kind"] == "table")
            .count(),
        2
    );
}

#[tokio::test]
async fn rerun_replaces_collection() {
    let dir = tempfile::tempdir().unwrap();
    let vectors = Arc::new(InMemoryVectorStore::new());
    let provider = MockProvider::default().with_dimensions(DIM);
    let objects = bucket().await;

    let p = pipeline(
        dir.path(),
        objects,
        vectors.clone(),
        provider,
        Arc::new(StubConverter::default()),
    );
    p.run(&["a".into()]).await.unwrap();
    let second = p.run(&["a".into()]).await.unwrap();

    assert_eq!(second.fetch.downloaded_files(), 0);
    assert_eq!(vectors.point_count("docs"), Some(7));
}

#[tokio::test]
async fn run_is_scoped_to_requested_ids_and_parses_once() {
    let dir = tempfile::tempdir().unwrap();
    let vectors = Arc::new(InMemoryVectorStore::new());
    let provider = MockProvider::default().with_dimensions(DIM);
    let converter = Arc::new(StubConverter::default());

    // left over from an earlier, unrelated run
    std::fs::create_dir_all(dir.path().join("old")).unwrap();
    std::fs::write(dir.path().join("old/old.pdf"), b"%PDF-old").unwrap();

    let p = pipeline(
        dir.path(),
        bucket().await,
        vectors.clone(),
        provider.clone(),
        converter.clone(),
    );
    let first = p.run(&["b".into()]).await.unwrap();
    let chats_after_first = provider.chat_calls().len();
    let second = p.run(&["b".into(), "b".into()]).await.unwrap();

    assert_eq!(first.documents, 1);
    assert_eq!(second.documents, 1);
    assert_eq!(converter.converted(), vec![dir.path().join("b/beta.pdf")]);
    assert_eq!(provider.chat_calls().len(), chats_after_first);
    assert!(!dir.path().join("old/parsed_documents").exists());
    assert_eq!(vectors.point_count("docs"), Some(7));
    let old_points = vectors
        .scroll("docs", Some(VectorFilter::text_equals("document_id", "old")), 100)
        .await
        .unwrap();
    assert!(old_points.is_empty());
}
