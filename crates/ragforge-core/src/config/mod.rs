mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const QDRANT_API_KEY: &str = "QDRANT_API_KEY";
pub const GATEWAY_TOKEN: &str = "RAGFORGE_GATEWAY_TOKEN";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Pull API keys and the gateway token from `vault`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret(OPENAI_API_KEY).await? {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret(QDRANT_API_KEY).await? {
            self.secrets.qdrant_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret(GATEWAY_TOKEN).await? {
            self.secrets.gateway_token = Some(Secret::new(val));
        }
        Ok(())
    }

    /// Reject settings no component can run with.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> anyhow::Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be at least 1");
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be less than chunking.chunk_size ({})",
                chunking.chunk_overlap,
                chunking.chunk_size
            );
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be at least 1");
        }
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be at least 1");
        }
        if !(self.parser.images_scale.is_finite() && self.parser.images_scale > 0.0) {
            bail!("parser.images_scale must be a positive number");
        }
        if self.index.collection.trim().is_empty() {
            bail!("index.collection must not be empty");
        }
        if self.index.poll_interval_ms == 0 {
            bail!("index.poll_interval_ms must be at least 1");
        }
        if self.agents.top_k == 0 {
            bail!("agents.top_k must be at least 1");
        }
        Ok(())
    }

    /// The OpenAI API key, required by every command that calls the model.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when the key was not resolved.
    pub fn openai_api_key(&self) -> anyhow::Result<&Secret> {
        self.secrets
            .openai_api_key
            .as_ref()
            .with_context(|| format!("{OPENAI_API_KEY} is not set"))
    }

    /// The bucket to fetch from, required by `fetch` and `ingest`.
    ///
    /// # Errors
    ///
    /// Returns an error when no bucket is configured.
    pub fn bucket(&self) -> anyhow::Result<&str> {
        let bucket = self.storage.bucket.trim();
        if bucket.is_empty() {
            bail!("storage.bucket is not set (S3_BUCKET_NAME)");
        }
        Ok(bucket)
    }
}
