use std::str::FromStr;

use super::Config;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    let parsed = v.trim().parse::<T>().ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

/// Deserialize a lowercase enum variant the same way the TOML file would.
fn parsed_enum<T: serde::de::DeserializeOwned>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    let parsed = serde_json::from_value(serde_json::Value::String(v.trim().to_lowercase())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_services();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_services(&mut self) {
        if let Ok(v) = std::env::var("RAGFORGE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("RAGFORGE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("RAGFORGE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(n) = parsed("RAGFORGE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = n;
        }

        // Conventional names first; the RAGFORGE_ spelling wins when both are set.
        if let Ok(v) = std::env::var("S3_BUCKET_NAME") {
            self.storage.bucket = v;
        }
        if let Ok(v) = std::env::var("RAGFORGE_STORAGE_BUCKET") {
            self.storage.bucket = v;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_DIRECTORY") {
            self.storage.download_dir = v;
        }
        if let Ok(v) = std::env::var("RAGFORGE_DOWNLOAD_DIR") {
            self.storage.download_dir = v;
        }
        if let Ok(v) = std::env::var("RAGFORGE_STORAGE_ENDPOINT") {
            self.storage.endpoint = Some(v);
        }

        if let Some(backend) = parsed_enum("RAGFORGE_PARSER_BACKEND") {
            self.parser.backend = backend;
        }
        if let Ok(v) = std::env::var("RAGFORGE_DOCLING_URL") {
            self.parser.docling_url = v;
        }

        if let Ok(v) = std::env::var("RAGFORGE_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("RAGFORGE_INDEX_COLLECTION") {
            self.index.collection = v;
        }

        if let Ok(v) = std::env::var("RAGFORGE_ARXIV_BASE_URL") {
            self.agents.arxiv_base_url = v;
        }
        if let Ok(v) = std::env::var("RAGFORGE_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = parsed("RAGFORGE_GATEWAY_PORT") {
            self.gateway.port = port;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Some(n) = parsed("RAGFORGE_CHUNK_SIZE") {
            self.chunking.chunk_size = n;
        }
        if let Some(n) = parsed("RAGFORGE_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = n;
        }
        if let Some(n) = parsed("RAGFORGE_EMBEDDING_BATCH_SIZE") {
            self.embedding.batch_size = n;
        }
        if let Some(n) = parsed("RAGFORGE_EMBEDDING_DIMENSION") {
            self.embedding.dimension = n;
        }
        if let Some(mode) = parsed_enum("RAGFORGE_INDEX_MODE") {
            self.index.mode = mode;
        }
        if let Some(secs) = parsed("RAGFORGE_INDEX_READY_TIMEOUT") {
            self.index.ready_timeout_secs = secs;
        }
        if let Some(n) = parsed("RAGFORGE_AGENTS_TOP_K") {
            self.agents.top_k = n;
        }
    }
}
