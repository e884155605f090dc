use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::AgentError;
use crate::index::{BoxFuture, QueryIndex};

/// An agent addressable by name through [`crate::AgentManager`].
///
/// `query` forwards the caller's dict to the agent's index unchanged.
pub trait QueryAgent: Send + Sync {
    fn name(&self) -> &'static str;

    fn query<'a>(&'a self, query: &'a Value) -> BoxFuture<'a, Result<Value, AgentError>>;
}

macro_rules! query_agent {
    ($(#[$doc:meta])* $agent:ident, $name:literal, $method:ident($arg:ident) => $field:literal) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $agent {
            index: Arc<dyn QueryIndex>,
        }

        impl $agent {
            pub const NAME: &'static str = $name;

            #[must_use]
            pub fn new(index: Arc<dyn QueryIndex>) -> Self {
                Self { index }
            }

            #[doc = concat!("Query the index with `{\"", $field, "\": ...}`.")]
            ///
            /// # Errors
            ///
            /// Returns whatever the index returns.
            pub async fn $method(&self, $arg: &str) -> Result<Value, AgentError> {
                tracing::debug!(agent = $name, "forwarding query");
                self.index.query(&json!({ $field: $arg })).await
            }
        }

        impl std::fmt::Debug for $agent {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($agent)).finish_non_exhaustive()
            }
        }

        impl QueryAgent for $agent {
            fn name(&self) -> &'static str {
                Self::NAME
            }

            fn query<'a>(&'a self, query: &'a Value) -> BoxFuture<'a, Result<Value, AgentError>> {
                self.index.query(query)
            }
        }
    };
}

query_agent!(
    /// Lists the stored content of one document.
    ExploreAgent, "explore_docs", explore(document_id) => "document_id"
);
query_agent!(
    /// Loads one document's content by id.
    LoadDocumentAgent, "load_document", load(document_id) => "document_id"
);
query_agent!(
    /// Keyword search over indexed research papers.
    ArxivAgent, "arxiv_search", search_papers(keywords) => "keywords"
);
query_agent!(WebSearchAgent, "web_search", search(query) => "query");
query_agent!(RetrieveAgent, "retrieve", retrieve_document(keywords) => "keywords");
query_agent!(ChatAgent, "chat", chat_response(question) => "question");
query_agent!(SearchAgent, "search", search(title) => "title");
