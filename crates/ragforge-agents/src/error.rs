use ragforge_ingest::VectorStoreError;
use ragforge_llm::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("arXiv API returned status {status}")]
    Api { status: u16 },

    #[error("failed to parse Atom feed: {0}")]
    Feed(#[from] quick_xml::DeError),
}
