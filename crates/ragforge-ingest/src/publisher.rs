//! Embed texts and write them to a fresh (or existing) vector collection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ragforge_llm::LlmProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedder::{BatchEmbedder, EmbedError};
use crate::types::SourceText;
use crate::vector_store::{VectorPoint, VectorStore, VectorStoreError};

pub const DEFAULT_COLLECTION: &str = "ragforge-documents";
pub const DEFAULT_DIMENSION: u64 = 3072;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("embedding {index} has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        index: usize,
        expected: u64,
        actual: usize,
    },

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("collection {collection} not ready after {waited:?}")]
    ReadyTimeout { collection: String, waited: Duration },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Drop any existing collection and create it fresh.
    #[default]
    Replace,
    /// Keep existing points; create the collection only if missing.
    Append,
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub collection: String,
    pub dimension: u64,
    pub mode: PublishMode,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.into(),
            dimension: DEFAULT_DIMENSION,
            mode: PublishMode::Replace,
            ready_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub collection: String,
    /// Point ids in input order.
    pub ids: Vec<String>,
    pub dimension: u64,
}

pub struct IndexPublisher<P> {
    store: Arc<dyn VectorStore>,
    provider: P,
    embedder: BatchEmbedder,
    config: PublisherConfig,
}

impl<P> std::fmt::Debug for IndexPublisher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexPublisher")
            .field("embedder", &self.embedder)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> IndexPublisher<P> {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: P,
        embedder: BatchEmbedder,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            provider,
            embedder,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Embed `texts` and upsert them in a single call.
    ///
    /// Embedding and dimension checks happen before the index is touched.
    /// An empty input is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error on embedding failure, a dimension mismatch, a store
    /// failure, or when the collection does not become ready in time.
    pub async fn publish(&self, texts: &[SourceText]) -> Result<PublishReport, PublishError> {
        let collection = &self.config.collection;
        if texts.is_empty() {
            tracing::info!(collection, "nothing to publish");
            return Ok(PublishReport {
                collection: collection.clone(),
                ids: Vec::new(),
                dimension: self.config.dimension,
            });
        }

        let inputs: Vec<String> = texts.iter().map(|t| t.text.clone()).collect();
        let vectors = self.embedder.embed_all(&self.provider, &inputs).await?;

        if let Some((index, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() as u64 != self.config.dimension)
        {
            tracing::error!(collection, index, actual = v.len(), "embedding dimension mismatch");
            return Err(PublishError::DimensionMismatch {
                index,
                expected: self.config.dimension,
                actual: v.len(),
            });
        }

        self.prepare_collection().await?;
        self.wait_until_ready().await?;

        let mut ids = Vec::with_capacity(texts.len());
        let points: Vec<VectorPoint> = texts
            .iter()
            .zip(vectors)
            .map(|(source, vector)| {
                let id = Uuid::new_v4().to_string();
                ids.push(id.clone());
                VectorPoint {
                    payload: point_payload(&id, source),
                    id,
                    vector,
                }
            })
            .collect();

        self.store.upsert(collection, points).await?;
        tracing::info!(collection, points = ids.len(), "published embeddings");

        Ok(PublishReport {
            collection: collection.clone(),
            ids,
            dimension: self.config.dimension,
        })
    }

    async fn prepare_collection(&self) -> Result<(), PublishError> {
        let collection = &self.config.collection;
        if self.config.mode == PublishMode::Replace && self.store.collection_exists(collection).await?
        {
            tracing::info!(collection, "replacing existing collection");
            self.store.delete_collection(collection).await?;
        }
        self.store
            .ensure_collection(collection, self.config.dimension)
            .await?;
        Ok(())
    }

    async fn poll_ready(&self) -> Result<(), VectorStoreError> {
        let collection = &self.config.collection;
        loop {
            if self.store.collection_ready(collection).await? {
                return Ok(());
            }
            tracing::debug!(collection, "waiting for collection to become ready");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn wait_until_ready(&self) -> Result<(), PublishError> {
        let collection = &self.config.collection;
        match tokio::time::timeout(self.config.ready_timeout, self.poll_ready()).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::error!(collection, "collection not ready in time");
                Err(PublishError::ReadyTimeout {
                    collection: collection.clone(),
                    waited: self.config.ready_timeout,
                })
            }
        }
    }
}

fn point_payload(id: &str, source: &SourceText) -> HashMap<String, serde_json::Value> {
    let mut payload = HashMap::from([
        ("id".to_owned(), serde_json::Value::from(id)),
        ("text".to_owned(), serde_json::Value::from(source.text.as_str())),
        ("kind".to_owned(), serde_json::Value::from(source.kind.as_str())),
    ]);
    if let Some(doc) = &source.document_id {
        payload.insert("document_id".into(), serde_json::Value::from(doc.as_str()));
    }
    payload
}
