//! Document ingestion: object-store fetch, PDF parsing, visual summaries,
//! chunking, batched embedding and vector index publishing.

pub mod collector;
pub mod embedder;
pub mod error;
pub mod fetcher;
pub mod in_memory_store;
pub mod markdown;
pub mod parser;
pub mod pipeline;
pub mod publisher;
pub mod qdrant_ops;
pub mod splitter;
pub mod summarizer;
pub mod types;
pub mod vector_store;

pub use collector::TextCollector;
pub use embedder::{BatchEmbedder, EmbedError};
pub use error::IngestError;
pub use fetcher::{FetchError, FetchOutcome, FetchReport, ObjectStoreFetcher};
pub use in_memory_store::InMemoryVectorStore;
pub use parser::{DocumentConverter, DocumentParser, DoclingConverter, ParseError, ParserConfig};
#[cfg(feature = "pdf")]
pub use parser::PdfTextConverter;
pub use pipeline::{IngestReport, IngestionPipeline};
pub use publisher::{IndexPublisher, PublishError, PublishMode, PublishReport, PublisherConfig};
pub use qdrant_ops::QdrantOps;
pub use splitter::{SplitterConfig, TextSplitter};
pub use summarizer::{ImageSummarizer, SummaryOutcome, SummaryReport};
pub use types::{Chunk, DocumentId, ParsedDocument, SourceText, TextKind, VisualKind};
pub use vector_store::{
    FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore,
    VectorStoreError,
};
