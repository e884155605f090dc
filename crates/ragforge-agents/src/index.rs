use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ragforge_ingest::{ScoredVectorPoint, VectorFilter, VectorStore};
use ragforge_llm::LlmProvider;
use serde_json::{Value, json};

use crate::error::AgentError;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const DEFAULT_TOP_K: u32 = 5;

const DOCUMENT_ID_FIELD: &str = "document_id";

/// A pre-built index answering structured JSON queries.
pub trait QueryIndex: Send + Sync {
    fn query<'a>(&'a self, query: &'a Value) -> BoxFuture<'a, Result<Value, AgentError>>;
}

/// [`QueryIndex`] over a vector collection written by the ingestion publisher.
///
/// Every string field other than `document_id` is joined (in key order) into
/// the query text, which is embedded and searched. `document_id` narrows the
/// search to one document. A query with only `document_id` lists that
/// document's points instead of ranking them.
pub struct VectorQueryIndex<P> {
    store: Arc<dyn VectorStore>,
    provider: P,
    collection: String,
    top_k: u32,
}

impl<P> std::fmt::Debug for VectorQueryIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorQueryIndex")
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> VectorQueryIndex<P> {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, provider: P, collection: impl Into<String>) -> Self {
        Self {
            store,
            provider,
            collection: collection.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn run(&self, query: &Value) -> Result<Value, AgentError> {
        let (text, document_id) = split_query(query)?;
        let filter = document_id.map(|id| VectorFilter::text_equals(DOCUMENT_ID_FIELD, id));

        let points = match (text, filter) {
            (Some(text), filter) => {
                let vector = self.provider.embed(&text).await?;
                self.store
                    .search(&self.collection, vector, u64::from(self.top_k), filter)
                    .await?
            }
            (None, Some(filter)) => {
                self.store
                    .scroll(&self.collection, Some(filter), self.top_k)
                    .await?
            }
            (None, None) => {
                return Err(AgentError::InvalidQuery(
                    "query has neither text fields nor a document_id".into(),
                ));
            }
        };

        tracing::debug!(collection = %self.collection, hits = points.len(), "index query");
        Ok(json!({ "hits": points.iter().map(hit_json).collect::<Vec<_>>() }))
    }
}

impl<P: LlmProvider> QueryIndex for VectorQueryIndex<P> {
    fn query<'a>(&'a self, query: &'a Value) -> BoxFuture<'a, Result<Value, AgentError>> {
        Box::pin(self.run(query))
    }
}

fn split_query(query: &Value) -> Result<(Option<String>, Option<&str>), AgentError> {
    let Value::Object(fields) = query else {
        return Err(AgentError::InvalidQuery("query must be a JSON object".into()));
    };

    let mut document_id = None;
    let mut parts = Vec::new();
    for (key, value) in fields {
        match (key.as_str(), value) {
            (DOCUMENT_ID_FIELD, Value::String(id)) => {
                let id = id.trim();
                if !id.is_empty() {
                    document_id = Some(id);
                }
            }
            (DOCUMENT_ID_FIELD, _) => {
                return Err(AgentError::InvalidQuery("document_id must be a string".into()));
            }
            (_, Value::String(s)) if !s.trim().is_empty() => parts.push(s.trim()),
            _ => {}
        }
    }

    let text = (!parts.is_empty()).then(|| parts.join(" "));
    Ok((text, document_id))
}

fn hit_json(point: &ScoredVectorPoint) -> Value {
    let field = |name: &str| point.payload.get(name).cloned().unwrap_or(Value::Null);
    json!({
        "id": point.id,
        "score": point.score,
        "text": field("text"),
        "document_id": field(DOCUMENT_ID_FIELD),
        "kind": field("kind"),
    })
}
