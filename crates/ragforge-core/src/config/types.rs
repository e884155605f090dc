use ragforge_ingest::PublishMode;
use serde::{Deserialize, Serialize};

use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub parser: ParserSettings,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-4o".into()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".into()
}

/// OpenAI-compatible endpoint used for chat, vision and embeddings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_download_dir() -> String {
    "./downloads".into()
}

/// S3 bucket holding one key prefix per document id. Credentials and region
/// come from the standard `AWS_*` variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (`MinIO`, `LocalStack`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            download_dir: default_download_dir(),
            region: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserBackend {
    /// docling-serve: markdown, tables and pictures.
    #[default]
    Docling,
    /// Local text extraction, requires the `pdf` feature.
    Pdf,
}

impl ParserBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docling => "docling",
            Self::Pdf => "pdf",
        }
    }
}

fn default_docling_url() -> String {
    "http://localhost:5001".into()
}

fn default_true() -> bool {
    true
}

fn default_images_scale() -> f32 {
    5.0
}

fn default_parser_timeout() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserSettings {
    #[serde(default)]
    pub backend: ParserBackend,
    #[serde(default = "default_docling_url")]
    pub docling_url: String,
    #[serde(default = "default_true")]
    pub do_ocr: bool,
    #[serde(default = "default_true")]
    pub do_table_structure: bool,
    #[serde(default = "default_true")]
    pub table_cell_matching: bool,
    #[serde(default = "default_images_scale")]
    pub images_scale: f32,
    /// Per-document conversion timeout in seconds.
    #[serde(default = "default_parser_timeout")]
    pub timeout_secs: u64,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            backend: ParserBackend::default(),
            docling_url: default_docling_url(),
            do_ocr: true,
            do_table_structure: true,
            table_cell_matching: true,
            images_scale: default_images_scale(),
            timeout_secs: default_parser_timeout(),
        }
    }
}

fn default_chunk_size() -> usize {
    4000
}

fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_dimension() -> u64 {
    3072
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_dimension")]
    pub dimension: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            dimension: default_dimension(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    ragforge_ingest::publisher::DEFAULT_COLLECTION.into()
}

fn default_ready_timeout() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub mode: PublishMode,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
            mode: PublishMode::default(),
            ready_timeout_secs: default_ready_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_max_image_bytes() -> u64 {
    ragforge_ingest::summarizer::DEFAULT_MAX_IMAGE_BYTES
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn default_top_k() -> u32 {
    ragforge_agents::index::DEFAULT_TOP_K
}

fn default_arxiv_url() -> String {
    ragforge_agents::arxiv::ARXIV_BASE_URL.into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentsConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_arxiv_url")]
    pub arxiv_base_url: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            arxiv_base_url: default_arxiv_url(),
        }
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8090
}

fn default_gateway_rate_limit() -> u32 {
    120
}

fn default_gateway_max_body() -> usize {
    1_048_576
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Requests per client IP per minute on protected routes. 0 disables.
    #[serde(default = "default_gateway_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            rate_limit: default_gateway_rate_limit(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

/// Secrets pulled from the vault after loading; never read from the TOML file.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub qdrant_api_key: Option<Secret>,
    pub gateway_token: Option<Secret>,
}
