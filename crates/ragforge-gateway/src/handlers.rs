use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ragforge_agents::{AgentError, ResearchOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::server::AppState;

const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_CAP: usize = 50;

/// Envelope returned by every agent and research endpoint. The HTTP status
/// always equals `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub status: u16,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Value,
}

impl ServiceResponse {
    #[must_use]
    pub fn json(message: Value) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            kind: "json".into(),
            message,
        }
    }

    #[must_use]
    pub fn text(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            kind: "string".into(),
            message: Value::String(message.into()),
        }
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    uptime_secs: u64,
}

#[derive(Deserialize)]
pub(crate) struct ResearchRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        message: "ragforge gateway is running",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn agent_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ServiceResponse {
    let query = match payload {
        Ok(Json(query)) => query,
        Err(rejection) => return rejected_body(&rejection),
    };
    match state.manager.route_request(&name, &query).await {
        Ok(result) if has_no_hits(&result) => {
            tracing::info!(agent = %name, "query returned no hits");
            ServiceResponse::text(
                StatusCode::NOT_FOUND,
                format!("No results found for agent {name}."),
            )
        }
        Ok(result) => ServiceResponse::json(result),
        Err(e @ (AgentError::InvalidArgument(_) | AgentError::InvalidQuery(_))) => {
            ServiceResponse::text(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            tracing::error!(agent = %name, "agent query failed: {e}");
            internal_error(&e)
        }
    }
}

pub(crate) async fn research_handler(
    State(state): State<AppState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> ServiceResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejected_body(&rejection),
    };
    let question = req.query.trim();
    if question.is_empty() {
        return ServiceResponse::text(StatusCode::BAD_REQUEST, "query must not be empty");
    }
    let max_results = req.max_results.clamp(1, MAX_RESULTS_CAP);

    match state.researcher.ask(question, max_results).await {
        Ok(ResearchOutcome::Found(articles)) => match serde_json::to_value(articles) {
            Ok(message) => ServiceResponse::json(message),
            Err(e) => internal_error(&e),
        },
        Ok(ResearchOutcome::NoKeywords) => ServiceResponse::text(
            StatusCode::NOT_FOUND,
            format!("Couldn't extract any relevant keywords from your question: {question}"),
        ),
        Ok(ResearchOutcome::NoResults) => ServiceResponse::text(
            StatusCode::NOT_FOUND,
            format!("No relevant papers found on ArXiv for your question: {question}"),
        ),
        Err(e) => {
            tracing::error!("arXiv research failed: {e}");
            internal_error(&e)
        }
    }
}

/// Oversized bodies keep 413; every other extraction failure is a 400.
fn rejected_body(rejection: &JsonRejection) -> ServiceResponse {
    let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    };
    tracing::debug!(%status, "rejected request body: {}", rejection.body_text());
    ServiceResponse::text(
        status,
        format!("Invalid request body: {}", rejection.body_text()),
    )
}

fn has_no_hits(result: &Value) -> bool {
    result
        .get("hits")
        .and_then(Value::as_array)
        .is_some_and(Vec::is_empty)
}

fn internal_error(e: &dyn std::fmt::Display) -> ServiceResponse {
    ServiceResponse::text(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("An error occurred while processing the request: {e}"),
    )
}
