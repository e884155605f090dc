//! Stateless query agents that forward structured queries to a shared index,
//! a name-keyed agent router, and an arXiv research service.

pub mod agents;
pub mod arxiv;
pub mod error;
pub mod index;
pub mod manager;

pub use agents::{
    ArxivAgent, ChatAgent, ExploreAgent, LoadDocumentAgent, QueryAgent, RetrieveAgent,
    SearchAgent, WebSearchAgent,
};
pub use arxiv::{ArxivArticle, ArxivClient, ResearchOutcome, ResearchService, Researcher};
pub use error::AgentError;
pub use index::{QueryIndex, VectorQueryIndex};
pub use manager::AgentManager;
