//! Builds every long-lived client and service from a loaded [`Config`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use ragforge_agents::{
    AgentManager, ArxivClient, QueryIndex, ResearchService, Researcher, VectorQueryIndex,
};
use ragforge_ingest::{
    BatchEmbedder, DoclingConverter, DocumentConverter, DocumentParser, ImageSummarizer,
    IndexPublisher, IngestionPipeline, ObjectStoreFetcher, ParserConfig, PublisherConfig,
    QdrantOps, SplitterConfig, TextCollector, TextSplitter, VectorStore,
};
use ragforge_llm::LlmProvider;
use ragforge_llm::openai::OpenAiProvider;

use crate::config::{Config, ParserBackend};
use crate::vault::{EnvVaultProvider, VaultProvider};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Priority: `--config` flag > `RAGFORGE_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("RAGFORGE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Load, resolve secrets from the environment and validate.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or a setting is invalid.
pub async fn load_config(path: &Path) -> anyhow::Result<Config> {
    load_config_with_vault(path, &EnvVaultProvider).await
}

/// [`load_config`] with an explicit secret source.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, the vault fails, or a
/// setting is invalid.
pub async fn load_config_with_vault(
    path: &Path,
    vault: &dyn VaultProvider,
) -> anyhow::Result<Config> {
    let mut config = Config::load(path)?;
    config.resolve_secrets(vault).await?;
    config.validate()?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// # Errors
///
/// Returns an error if `OPENAI_API_KEY` is missing or the embedding
/// dimension does not fit the API's integer type.
pub fn create_provider(config: &Config) -> anyhow::Result<OpenAiProvider> {
    let key = config.openai_api_key()?;
    let dimensions = u32::try_from(config.embedding.dimension)
        .context("embedding.dimension is too large")?;
    let mut provider = OpenAiProvider::new(
        key.expose().to_owned(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.max_tokens,
        Some(config.llm.embedding_model.clone()),
    )
    .with_embedding_dimensions(dimensions);
    if let Some(t) = config.llm.temperature {
        provider = provider.with_temperature(t);
    }
    tracing::info!(
        model = %config.llm.model,
        embedding_model = %config.llm.embedding_model,
        "using OpenAI provider"
    );
    Ok(provider)
}

/// S3 store for the configured bucket. Credentials come from the `AWS_*`
/// environment variables.
///
/// # Errors
///
/// Returns an error if no bucket is configured or the builder rejects the
/// settings.
pub fn create_object_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::from_env().with_bucket_name(config.bucket()?);
    if let Some(region) = &config.storage.region {
        builder = builder.with_region(region);
    }
    if let Some(endpoint) = &config.storage.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }
    let store = builder.build().context("failed to configure S3 client")?;
    Ok(Arc::new(store))
}

/// # Errors
///
/// Returns an error if the Qdrant client cannot be created.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let api_key = config
        .secrets
        .qdrant_api_key
        .as_ref()
        .map(|k| k.expose().to_owned());
    let url = &config.index.qdrant_url;
    let ops = QdrantOps::new(url, api_key)
        .map_err(|e| anyhow::anyhow!("failed to create Qdrant client for {url}: {e}"))?;
    Ok(Arc::new(ops))
}

/// # Errors
///
/// Returns an error if the `pdf` backend is selected without the `pdf` feature,
/// or the HTTP client cannot be built.
pub fn create_converter(config: &Config) -> anyhow::Result<Arc<dyn DocumentConverter>> {
    let settings = &config.parser;
    match settings.backend {
        ParserBackend::Docling => {
            let client = reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(30))
                .timeout(Duration::from_secs(settings.timeout_secs))
                .user_agent(concat!("ragforge/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("failed to build docling HTTP client")?;
            let parser_config = ParserConfig {
                do_ocr: settings.do_ocr,
                do_table_structure: settings.do_table_structure,
                table_cell_matching: settings.table_cell_matching,
                images_scale: settings.images_scale,
            };
            Ok(Arc::new(
                DoclingConverter::new(&settings.docling_url, parser_config).with_client(client),
            ))
        }
        #[cfg(feature = "pdf")]
        ParserBackend::Pdf => Ok(Arc::new(ragforge_ingest::PdfTextConverter::default())),
        #[cfg(not(feature = "pdf"))]
        ParserBackend::Pdf => anyhow::bail!("parser backend 'pdf' requires the `pdf` feature"),
    }
}

#[must_use]
pub fn publisher_config(config: &Config) -> PublisherConfig {
    PublisherConfig {
        collection: config.index.collection.clone(),
        dimension: config.embedding.dimension,
        mode: config.index.mode,
        ready_timeout: Duration::from_secs(config.index.ready_timeout_secs),
        poll_interval: Duration::from_millis(config.index.poll_interval_ms),
    }
}

/// # Errors
///
/// Returns an error if the object store cannot be configured.
pub fn create_fetcher(config: &Config) -> anyhow::Result<ObjectStoreFetcher> {
    Ok(ObjectStoreFetcher::new(
        create_object_store(config)?,
        &config.storage.download_dir,
    ))
}

/// # Errors
///
/// Returns an error if the converter cannot be built.
pub fn create_parser(config: &Config) -> anyhow::Result<DocumentParser> {
    Ok(DocumentParser::new(create_converter(config)?))
}

#[must_use]
pub fn create_collector<P: LlmProvider>(config: &Config, provider: P) -> TextCollector<P> {
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
    });
    let summarizer =
        ImageSummarizer::new(provider).with_max_image_bytes(config.summarizer.max_image_bytes);
    TextCollector::new(splitter, summarizer)
}

/// # Errors
///
/// Returns an error if the batch size is zero.
pub fn create_publisher<P: LlmProvider>(
    config: &Config,
    store: Arc<dyn VectorStore>,
    provider: P,
) -> anyhow::Result<IndexPublisher<P>> {
    let embedder = BatchEmbedder::new(config.embedding.batch_size)?;
    Ok(IndexPublisher::new(
        store,
        provider,
        embedder,
        publisher_config(config),
    ))
}

/// Wire every ingestion stage against the production services.
///
/// # Errors
///
/// Returns an error if any client cannot be configured.
pub fn create_ingestion_pipeline(
    config: &Config,
) -> anyhow::Result<IngestionPipeline<OpenAiProvider>> {
    let provider = create_provider(config)?;
    let store = create_vector_store(config)?;
    Ok(IngestionPipeline::new(
        create_fetcher(config)?,
        create_parser(config)?,
        create_collector(config, provider.clone()),
        create_publisher(config, store, provider)?,
    ))
}

#[must_use]
pub fn create_query_index<P: LlmProvider + 'static>(
    config: &Config,
    store: Arc<dyn VectorStore>,
    provider: P,
) -> Arc<dyn QueryIndex> {
    Arc::new(
        VectorQueryIndex::new(store, provider, config.index.collection.clone())
            .with_top_k(config.agents.top_k),
    )
}

#[must_use]
pub fn create_research_service<P: LlmProvider + 'static>(
    config: &Config,
    provider: P,
) -> Arc<dyn Researcher> {
    let client = ArxivClient::new(ragforge_llm::http::default_client())
        .with_base_url(config.agents.arxiv_base_url.clone());
    Arc::new(ResearchService::new(provider, client))
}

/// Services backing the HTTP gateway.
pub struct QueryServices {
    pub manager: Arc<AgentManager>,
    pub researcher: Arc<dyn Researcher>,
}

impl std::fmt::Debug for QueryServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryServices")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

/// # Errors
///
/// Returns an error if the provider or vector store cannot be configured.
pub fn create_query_services(config: &Config) -> anyhow::Result<QueryServices> {
    let provider = create_provider(config)?;
    let store = create_vector_store(config)?;
    let index = create_query_index(config, store, provider.clone());
    Ok(QueryServices {
        manager: Arc::new(AgentManager::with_default_agents(&index)),
        researcher: create_research_service(config, provider),
    })
}
