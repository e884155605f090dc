use std::sync::Arc;
use std::time::Duration;

use ragforge_ingest::{
    BatchEmbedder, DocumentId, IndexPublisher, PublishMode, PublisherConfig, QdrantOps,
    SourceText, TextKind, VectorFilter, VectorStore,
};
use ragforge_llm::mock::MockProvider;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);
const COLLECTION: &str = "test_documents";
const DIM: usize = 16;

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup() -> (QdrantOps, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let port = container.get_host_port_ipv4(6334).await.unwrap();
    let ops = QdrantOps::new(&format!("http://127.0.0.1:{port}"), None).unwrap();
    (ops, container)
}

fn publisher(ops: &QdrantOps, provider: MockProvider, mode: PublishMode) -> IndexPublisher<MockProvider> {
    IndexPublisher::new(
        Arc::new(ops.clone()),
        provider,
        BatchEmbedder::default(),
        PublisherConfig {
            collection: COLLECTION.into(),
            dimension: DIM as u64,
            mode,
            ready_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        },
    )
}

fn texts(doc: &str, n: usize) -> Vec<SourceText> {
    (0..n)
        .map(|i| SourceText::new(format!("{doc} chunk {i}"), DocumentId::new(doc), TextKind::Chunk))
        .collect()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn ensure_collection_is_idempotent_and_ready() {
    let (ops, _container) = setup().await;

    ops.ensure_collection(COLLECTION, 4).await.unwrap();
    ops.ensure_collection(COLLECTION, 4).await.unwrap();

    assert!(ops.collection_exists(COLLECTION).await.unwrap());
    assert!(ops.collection_ready(COLLECTION).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn publish_then_search_and_scroll() {
    let (ops, _container) = setup().await;
    let provider = MockProvider::default().with_dimensions(DIM);

    let report = publisher(&ops, provider.clone(), PublishMode::Replace)
        .publish(&texts("alpha", 7))
        .await
        .unwrap();
    assert_eq!(report.ids.len(), 7);

    let hits = VectorStore::search(
        &ops,
        COLLECTION,
        provider.vector_for("alpha chunk 3"),
        3,
        None,
    )
    .await
    .unwrap();
    assert_eq!(hits[0].payload["text"], "alpha chunk 3");
    assert!(report.ids.contains(&hits[0].id));

    let scrolled = VectorStore::scroll(
        &ops,
        COLLECTION,
        Some(VectorFilter::text_equals("document_id", "alpha")),
        100,
    )
    .await
    .unwrap();
    assert_eq!(scrolled.len(), 7);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn replace_and_append_modes() {
    let (ops, _container) = setup().await;
    let provider = MockProvider::default().with_dimensions(DIM);

    publisher(&ops, provider.clone(), PublishMode::Replace)
        .publish(&texts("a", 3))
        .await
        .unwrap();
    publisher(&ops, provider.clone(), PublishMode::Append)
        .publish(&texts("b", 2))
        .await
        .unwrap();
    let all = VectorStore::scroll(&ops, COLLECTION, None, 100).await.unwrap();
    assert_eq!(all.len(), 5);

    publisher(&ops, provider, PublishMode::Replace)
        .publish(&texts("c", 1))
        .await
        .unwrap();
    let all = VectorStore::scroll(&ops, COLLECTION, None, 100).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].payload["document_id"], "c");
}
