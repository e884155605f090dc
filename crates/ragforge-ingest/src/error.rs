#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] crate::fetcher::FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] crate::parser::ParseError),

    #[error("publish failed: {0}")]
    Publish(#[from] crate::publisher::PublishError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
