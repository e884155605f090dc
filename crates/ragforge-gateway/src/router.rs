use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{agent_handler, health_handler, research_handler};
use super::server::AppState;

/// Clients tracked per window before stale entries are swept.
const MAX_TRACKED_CLIENTS: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct BearerAuth {
    expected: Option<blake3::Hash>,
}

impl BearerAuth {
    fn new(token: Option<String>) -> Self {
        Self {
            expected: token.map(|t| blake3::hash(t.as_bytes())),
        }
    }

    /// Constant-time comparison of BLAKE3 digests.
    fn allows(&self, authorization: Option<&str>) -> bool {
        let Some(expected) = self.expected else {
            return true;
        };
        let presented = authorization
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        let presented = blake3::hash(presented.as_bytes());
        bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
    }
}

#[derive(Clone)]
struct RateLimiter {
    limit: u32,
    windows: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn admit(&self, ip: IpAddr) -> bool {
        if self.limit == 0 {
            return true;
        }
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() >= MAX_TRACKED_CLIENTS && !windows.contains_key(&ip) {
            windows.retain(|_, (_, started)| now.duration_since(*started) < RATE_WINDOW);
        }

        let (count, started) = windows.entry(ip).or_insert((0, now));
        if now.duration_since(*started) >= RATE_WINDOW {
            *count = 1;
            *started = now;
            return true;
        }
        *count += 1;
        *count <= self.limit
    }
}

/// `/health` is open; `/agents/{name}` and `/arxiv` sit behind the body
/// limit, bearer auth and the per-client rate limit.
pub(crate) fn build_router(
    state: AppState,
    auth_token: Option<String>,
    rate_limit: u32,
    max_body_size: usize,
) -> Router {
    let protected = Router::new()
        .route("/agents/{name}", post(agent_handler))
        .route("/arxiv", post(research_handler))
        .layer(middleware::from_fn_with_state(
            RateLimiter::new(rate_limit),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            BearerAuth::new(auth_token),
            auth_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn auth_middleware(State(auth): State<BearerAuth>, req: Request<Body>, next: Next) -> Response {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !auth.allows(header) {
        tracing::warn!(path = %req.uri().path(), "rejected request with bad bearer token");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    next.run(req).await
}

async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());
    if !limiter.admit(ip).await {
        tracing::warn!(%ip, "rate limit exceeded");
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;

    use axum::body::Body;
    use http_body_util::BodyExt;
    use ragforge_agents::{
        AgentError, AgentManager, ArxivArticle, QueryIndex, ResearchOutcome, Researcher,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    type Fut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    /// Returns one hit per query, no hits for `{"keywords": "none"}` and a
    /// store failure for `{"keywords": "boom"}`.
    struct StubIndex;

    impl QueryIndex for StubIndex {
        fn query<'a>(&'a self, query: &'a Value) -> Fut<'a, Result<Value, AgentError>> {
            Box::pin(async move {
                match query.get("keywords").and_then(Value::as_str) {
                    Some("none") => Ok(json!({"hits": []})),
                    Some("boom") => Err(AgentError::Api { status: 502 }),
                    _ => Ok(json!({"hits": [{"id": "1", "query": query}]})),
                }
            })
        }
    }

    struct StubResearcher;

    impl Researcher for StubResearcher {
        fn ask<'a>(
            &'a self,
            question: &'a str,
            max_results: usize,
        ) -> Fut<'a, Result<ResearchOutcome, AgentError>> {
            Box::pin(async move {
                match question {
                    "?" => Ok(ResearchOutcome::NoKeywords),
                    "obscure" => Ok(ResearchOutcome::NoResults),
                    "fail" => Err(AgentError::Api { status: 503 }),
                    _ => Ok(ResearchOutcome::Found(
                        (0..max_results)
                            .map(|i| ArxivArticle {
                                arxiv_id: format!("2401.0000{i}"),
                                title: format!("Paper {i}"),
                                abstract_text: "abstract".into(),
                                link: format!("http://arxiv.org/abs/2401.0000{i}"),
                            })
                            .collect(),
                    )),
                }
            })
        }
    }

    fn make_router(auth: Option<String>, rate_limit: u32, max_body: usize) -> Router {
        let index: Arc<dyn QueryIndex> = Arc::new(StubIndex);
        let state = AppState {
            manager: Arc::new(AgentManager::with_default_agents(&index)),
            researcher: Arc::new(StubResearcher),
            started_at: Instant::now(),
        };
        build_router(state, auth, rate_limit, max_body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_returns_healthy() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn agent_query_returns_json_envelope() {
        let req = post_json("/agents/retrieve", &json!({"keywords": "tables"}));
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], 200);
        assert_eq!(json["type"], "json");
        assert_eq!(json["message"]["hits"][0]["query"], json!({"keywords": "tables"}));
    }

    #[tokio::test]
    async fn unknown_agent_is_bad_request() {
        let req = post_json("/agents/nope", &json!({"keywords": "x"}));
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], 400);
        assert_eq!(json["type"], "string");
        assert!(json["message"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn empty_hits_is_not_found() {
        let req = post_json("/agents/search", &json!({"keywords": "none"}));
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["status"], 404);
    }

    #[tokio::test]
    async fn index_failure_is_internal_error() {
        let req = post_json("/agents/chat", &json!({"keywords": "boom"}));
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["status"], 500);
        assert!(
            json["message"]
                .as_str()
                .unwrap()
                .starts_with("An error occurred while processing the request")
        );
    }

    #[tokio::test]
    async fn arxiv_returns_formatted_articles() {
        let req = post_json("/arxiv", &json!({"query": "retrieval", "max_results": 2}));
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::OK);
        let articles = json["message"].as_array().unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0]["ArXiv ID"], "2401.00000");
        assert_eq!(articles[1]["Title"], "Paper 1");
    }

    #[tokio::test]
    async fn arxiv_default_max_results() {
        let req = post_json("/arxiv", &json!({"query": "retrieval"}));
        let (_, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(json["message"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn arxiv_not_found_messages() {
        let (status, json) = send(
            make_router(None, 0, 1024),
            post_json("/arxiv", &json!({"query": "?"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json["message"],
            "Couldn't extract any relevant keywords from your question: ?"
        );

        let (status, json) = send(
            make_router(None, 0, 1024),
            post_json("/arxiv", &json!({"query": "obscure"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json["message"],
            "No relevant papers found on ArXiv for your question: obscure"
        );
    }

    #[tokio::test]
    async fn arxiv_failure_is_internal_error() {
        let req = post_json("/arxiv", &json!({"query": "fail"}));
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["type"], "string");
    }

    #[tokio::test]
    async fn arxiv_blank_query_is_bad_request() {
        let req = post_json("/arxiv", &json!({"query": "   "}));
        let (status, _) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auth_rejects_missing_token() {
        let req = post_json("/agents/chat", &json!({"question": "q"}));
        let (status, _) = send(make_router(Some("secret".into()), 0, 1024), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_rejects_wrong_token() {
        let mut req = post_json("/arxiv", &json!({"query": "q"}));
        req.headers_mut()
            .insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        let (status, _) = send(make_router(Some("secret".into()), 0, 1024), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_accepts_valid_token() {
        let mut req = post_json("/agents/chat", &json!({"question": "q"}));
        req.headers_mut()
            .insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        let (status, _) = send(make_router(Some("secret".into()), 0, 1024), req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_skips_auth() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(make_router(Some("secret".into()), 0, 1024), req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limit_enforced() {
        use tower::Service;

        let mut app = make_router(None, 2, 1024);
        let make_req = || post_json("/agents/chat", &json!({"question": "q"}));

        assert_eq!(app.call(make_req()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.call(make_req()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.call(make_req()).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn body_size_limit() {
        let req = Request::builder()
            .method("POST")
            .uri("/agents/chat")
            .header("content-type", "application/json")
            .body(Body::from(vec![b'a'; 128]))
            .unwrap();
        let (status, json) = send(make_router(None, 0, 64), req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["status"], 413);
        assert_eq!(json["type"], "string");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request_envelope() {
        let req = Request::builder()
            .method("POST")
            .uri("/agents/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], 400);
        assert_eq!(json["type"], "string");
        assert!(json["message"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn missing_content_type_is_bad_request_envelope() {
        let req = Request::builder()
            .method("POST")
            .uri("/arxiv")
            .body(Body::from(r#"{"query": "attention"}"#))
            .unwrap();
        let (status, json) = send(make_router(None, 0, 1024), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], 400);
    }

    #[tokio::test]
    async fn arxiv_missing_query_field_is_bad_request_envelope() {
        let (status, json) = send(
            make_router(None, 0, 1024),
            post_json("/arxiv", &json!({"max_results": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["type"], "string");
    }

    #[test]
    fn bearer_auth_without_token_allows_all() {
        let auth = BearerAuth::new(None);
        assert!(auth.allows(None));
        assert!(auth.allows(Some("Bearer anything")));
    }

    #[test]
    fn bearer_auth_requires_prefix() {
        let auth = BearerAuth::new(Some("secret".into()));
        assert!(auth.allows(Some("Bearer secret")));
        assert!(!auth.allows(Some("secret")));
        assert!(!auth.allows(Some("Basic secret")));
    }
}
