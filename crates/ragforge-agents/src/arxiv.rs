//! arXiv paper search: LLM keyword extraction followed by an Atom feed query.

use ragforge_llm::{LlmProvider, Message, Role};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::index::BoxFuture;

pub const ARXIV_BASE_URL: &str = "http://export.arxiv.org";
pub const DEFAULT_MAX_RESULTS: usize = 5;

const KEYWORD_PROMPT: &str = "Given the following question, return a list of 5 relevant \
keywords or topics to search in research papers:\nQuestion: {question}\nRelevant Keywords/Topics (5):";

/// One paper, serialized with the field names API clients expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArxivArticle {
    #[serde(rename = "ArXiv ID")]
    pub arxiv_id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Abstract")]
    pub abstract_text: String,
    #[serde(rename = "Link")]
    pub link: String,
}

#[derive(Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
}

impl From<Entry> for ArxivArticle {
    fn from(entry: Entry) -> Self {
        let arxiv_id = entry
            .id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        Self {
            arxiv_id,
            title: collapse_whitespace(&entry.title),
            abstract_text: collapse_whitespace(&entry.summary),
            link: entry.id.trim().to_owned(),
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: ARXIV_BASE_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Search all fields for `keywords`, returning at most `max_results` papers.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Api`] on a non-success status, or a transport or
    /// feed parse error.
    pub async fn search(
        &self,
        keywords: &str,
        max_results: usize,
    ) -> Result<Vec<ArxivArticle>, AgentError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/query", self.base_url),
            &[
                ("search_query", format!("all:{keywords}")),
                ("start", "0".to_owned()),
                ("max_results", max_results.to_string()),
            ],
        )
        .map_err(|e| AgentError::InvalidArgument(format!("invalid arXiv URL: {e}")))?;

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "arXiv search failed");
            return Err(AgentError::Api {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        let feed: Feed = quick_xml::de::from_str(&body)?;
        let articles: Vec<ArxivArticle> = feed
            .entries
            .into_iter()
            .take(max_results)
            .map(ArxivArticle::from)
            .collect();
        tracing::info!(keywords, found = articles.len(), "arXiv search");
        Ok(articles)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchOutcome {
    /// The model produced no usable keywords.
    NoKeywords,
    NoResults,
    Found(Vec<ArxivArticle>),
}

/// Object-safe entry point used by the HTTP gateway.
pub trait Researcher: Send + Sync {
    fn ask<'a>(
        &'a self,
        question: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<ResearchOutcome, AgentError>>;
}

#[derive(Debug, Clone)]
pub struct ResearchService<P> {
    provider: P,
    client: ArxivClient,
}

impl<P: LlmProvider> ResearchService<P> {
    #[must_use]
    pub fn new(provider: P, client: ArxivClient) -> Self {
        Self { provider, client }
    }

    /// Ask the model for search keywords relevant to `question`.
    ///
    /// # Errors
    ///
    /// Returns an LLM error if the chat call fails.
    pub async fn extract_keywords(&self, question: &str) -> Result<Vec<String>, AgentError> {
        let prompt = KEYWORD_PROMPT.replace("{question}", question);
        let reply = self
            .provider
            .chat(&[Message::text(Role::User, prompt)])
            .await?;
        Ok(parse_keywords(&reply))
    }

    async fn run(&self, question: &str, max_results: usize) -> Result<ResearchOutcome, AgentError> {
        let keywords = self.extract_keywords(question).await?;
        if keywords.is_empty() {
            tracing::info!("no keywords extracted");
            return Ok(ResearchOutcome::NoKeywords);
        }

        let articles = self.client.search(&keywords.join(" "), max_results).await?;
        if articles.is_empty() {
            return Ok(ResearchOutcome::NoResults);
        }
        Ok(ResearchOutcome::Found(articles))
    }
}

impl<P: LlmProvider> Researcher for ResearchService<P> {
    fn ask<'a>(
        &'a self,
        question: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<ResearchOutcome, AgentError>> {
        Box::pin(self.run(question, max_results))
    }
}

/// Split a model reply into keywords. Handles comma lists and numbered or
/// bulleted lines.
fn parse_keywords(reply: &str) -> Vec<String> {
    reply
        .split(['\n', ','])
        .map(|k| {
            k.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*'))
                .trim()
                .trim_matches('"')
                .to_owned()
        })
        .filter(|k| !k.is_empty())
        .collect()
}
