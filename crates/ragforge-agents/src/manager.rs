use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::agents::{
    ArxivAgent, ChatAgent, ExploreAgent, LoadDocumentAgent, QueryAgent, RetrieveAgent,
    SearchAgent, WebSearchAgent,
};
use crate::error::AgentError;
use crate::index::QueryIndex;

/// Name-keyed registry of query agents.
#[derive(Default)]
pub struct AgentManager {
    agents: HashMap<&'static str, Arc<dyn QueryAgent>>,
}

impl std::fmt::Debug for AgentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentManager")
            .field("agents", &self.names())
            .finish()
    }
}

impl AgentManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every built-in agent against one shared index.
    #[must_use]
    pub fn with_default_agents(index: &Arc<dyn QueryIndex>) -> Self {
        let mut manager = Self::new();
        manager.register(ExploreAgent::new(Arc::clone(index)));
        manager.register(LoadDocumentAgent::new(Arc::clone(index)));
        manager.register(ArxivAgent::new(Arc::clone(index)));
        manager.register(WebSearchAgent::new(Arc::clone(index)));
        manager.register(RetrieveAgent::new(Arc::clone(index)));
        manager.register(ChatAgent::new(Arc::clone(index)));
        manager.register(SearchAgent::new(Arc::clone(index)));
        manager
    }

    /// Adds `agent` under its name, replacing any agent already registered there.
    pub fn register(&mut self, agent: impl QueryAgent + 'static) {
        self.agents.insert(agent.name(), Arc::new(agent));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.agents.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Forward `query` to the agent registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidArgument`] for an unknown name (no query is
    /// issued), otherwise whatever the agent's index returns.
    pub async fn route_request(&self, name: &str, query: &Value) -> Result<Value, AgentError> {
        let Some(agent) = self.agents.get(name) else {
            tracing::warn!(agent = name, "no agent registered under this name");
            return Err(AgentError::InvalidArgument(format!(
                "no agent found with name {name}"
            )));
        };
        agent.query(query).await
    }
}
