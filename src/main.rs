use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragforge_core::bootstrap;
use ragforge_core::config::Config;
use ragforge_gateway::GatewayServer;
use ragforge_ingest::{FetchOutcome, FetchReport, IngestReport, PublishReport};
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "ragforge", version, about = "PDF ingestion and query agents for RAG")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "RAGFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download each document's objects from the bucket.
    Fetch {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Convert every downloaded PDF into markdown, images and CSV tables.
    Parse,
    /// Summarize, chunk, embed and upload all parsed documents.
    Publish,
    /// Run fetch, parse and publish in sequence.
    Ingest {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Serve the query agents over HTTP.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = bootstrap::resolve_config_path(cli.config.as_deref());
    let config = bootstrap::load_config(&config_path)
        .await
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command {
        Command::Fetch { ids } => run_fetch(&config, &ids).await,
        Command::Parse => run_parse(&config).await,
        Command::Publish => run_publish(&config).await,
        Command::Ingest { ids } => run_ingest(&config, &ids).await,
        Command::Serve => run_serve(&config).await,
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_fetch(config: &Config, ids: &[String]) -> anyhow::Result<()> {
    let fetcher = bootstrap::create_fetcher(config)?;
    let report = fetcher.fetch_all(ids).await?;
    log_fetch(&report, fetcher.download_dir());
    Ok(())
}

async fn run_parse(config: &Config) -> anyhow::Result<()> {
    let parser = bootstrap::create_parser(config)?;
    let root = Path::new(&config.storage.download_dir);
    let parsed = parser.parse_all(root).await?;
    tracing::info!(
        documents = parsed.len(),
        backend = config.parser.backend.as_str(),
        "parse complete"
    );
    Ok(())
}

async fn run_publish(config: &Config) -> anyhow::Result<()> {
    let provider = bootstrap::create_provider(config)?;
    let store = bootstrap::create_vector_store(config)?;
    let collector = bootstrap::create_collector(config, provider.clone());
    let publisher = bootstrap::create_publisher(config, store, provider)?;

    let root = Path::new(&config.storage.download_dir);
    let parsed = ragforge_ingest::parser::load_parsed(root)
        .with_context(|| format!("failed to read parsed documents under {}", root.display()))?;
    if parsed.is_empty() {
        tracing::warn!(root = %root.display(), "no parsed documents found, run `parse` first");
    }

    let texts = collector.collect(&parsed).await?;
    let report = publisher.publish(&texts).await?;
    log_publish(&report);
    Ok(())
}

async fn run_ingest(config: &Config, ids: &[String]) -> anyhow::Result<()> {
    let pipeline = bootstrap::create_ingestion_pipeline(config)?;
    let IngestReport {
        fetch,
        documents,
        publish,
    } = pipeline.run(ids).await?;
    log_fetch(&fetch, Path::new(&config.storage.download_dir));
    tracing::info!(documents, "parsed");
    log_publish(&publish);
    Ok(())
}

async fn run_serve(config: &Config) -> anyhow::Result<()> {
    let services = bootstrap::create_query_services(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let gateway = &config.gateway;
    let token = config
        .secrets
        .gateway_token
        .as_ref()
        .map(|t| t.expose().to_owned());
    if token.is_none() {
        tracing::warn!("no gateway token configured, agent routes are unauthenticated");
    }

    GatewayServer::new(
        &gateway.bind,
        gateway.port,
        services.manager,
        services.researcher,
        shutdown_rx,
    )
    .with_auth(token)
    .with_rate_limit(gateway.rate_limit)
    .with_max_body_size(gateway.max_body_size)
    .serve()
    .await?;
    Ok(())
}

fn log_fetch(report: &FetchReport, root: &Path) {
    for (id, outcome) in &report.outcomes {
        match outcome {
            FetchOutcome::Skipped => tracing::info!(%id, "already present, skipped"),
            FetchOutcome::Empty => tracing::warn!(%id, "no objects found"),
            FetchOutcome::Downloaded { files } => {
                tracing::info!(%id, files = files.len(), "downloaded");
            }
        }
    }
    tracing::info!(
        files = report.downloaded_files(),
        root = %root.display(),
        "fetch complete"
    );
}

fn log_publish(report: &PublishReport) {
    tracing::info!(
        collection = %report.collection,
        points = report.ids.len(),
        dimension = report.dimension,
        "publish complete"
    );
}
