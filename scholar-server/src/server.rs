//! Axum setup and router configuration
//!
//! - CORS from `CORS_ORIGINS` (localhost defaults when unset, `*` for any)
//! - Request tracing and a 30 s timeout
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use scholar_core::config::ScholarConfig;
use scholar_core::deploy::DEFAULT_LOCAL_ORIGINS;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::routes;
use crate::settings::ServeConfig;
use crate::state::AppState;

/// CORS policy for a list of origins
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o.trim() == "*") {
        warn!("CORS: all origins allowed");
        return CorsLayer::permissive();
    }

    let configured: Vec<&str> = if origins.is_empty() {
        DEFAULT_LOCAL_ORIGINS.to_vec()
    } else {
        origins.iter().map(String::as_str).collect()
    };

    let allowed: Vec<HeaderValue> = configured
        .into_iter()
        .filter_map(|origin| {
            let origin = origin.trim().trim_end_matches('/');
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("CORS: ignoring invalid origin {:?}", origin);
                    None
                }
            }
        })
        .collect();
    info!("CORS: {} allowed origin(s)", allowed.len());

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Router with every `/api` route and the middleware stack
pub fn build_router(state: AppState, origins: &[String], timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer(origins));

    Router::new()
        .nest("/api", routes::api_router())
        .layer(middleware)
        .with_state(state)
}

/// Serve until Ctrl+C / SIGTERM
pub async fn run_server(config: &ScholarConfig, serve: ServeConfig) -> Result<()> {
    if serve.reload {
        warn!("API_RELOAD is set but hot reload is not supported by the compiled backend; ignoring");
    }

    let state = AppState::from_config(config).await?;
    info!(
        "Paper store: {} ({}/{})",
        state.indexer.store().backend(),
        config.database.namespace(),
        config.database.database()
    );

    let app = build_router(state, &serve.cors_origins, serve.timeout);

    let address = serve.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Starting acm backend on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::extract::{Path, Query};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Json;
    use scholar_chat::{ChatModel, ChatRequest, ChatResult};
    use scholar_core::work::Work;
    use scholar_index::{HashEmbedder, Indexer, MemoryStore, PaperRecord};
    use scholar_search::OpenAlexClient;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Store record built the way the indexer builds one from OpenAlex
    fn record(id: &str, title: &str) -> PaperRecord {
        let work: Work = serde_json::from_value(json!({
            "id": format!("https://openalex.org/{}", id),
            "title": title,
        }))
        .unwrap();
        PaperRecord::from_work(&work, None)
    }

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &ChatRequest) -> ChatResult<String> {
            let prompt = request.messages.last().map(|m| m.content.as_str()).unwrap_or("");
            Ok(format!("echo: {}", prompt.lines().nth(2).unwrap_or_default()))
        }
    }

    async fn spawn(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// OpenAlex stand-in: two works for any search, W1 lookups only
    async fn openalex_stub() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let captured = seen.clone();
        let router = Router::new()
            .route(
                "/works",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    let captured = captured.clone();
                    async move {
                        captured.lock().unwrap().push(q);
                        Json(json!({
                            "meta": {"count": 2},
                            "results": [
                                {"id": "https://openalex.org/W1", "title": "Deep Learning", "publication_year": 2015,
                                 "cited_by_count": 50000, "doi": "https://doi.org/10.1038/nature14539",
                                 "authorships": [{"author": {"display_name": "Yann LeCun"}}]},
                                {"id": "https://openalex.org/W2", "title": "Deep Learning for ACM", "publication_year": 2020,
                                 "cited_by_count": 10, "doi": "https://doi.org/10.1145/123"}
                            ]
                        }))
                    }
                }),
            )
            .route(
                "/works/{id}",
                get(|Path(id): Path<String>| async move {
                    match id.as_str() {
                        "W1" => Ok(Json(json!({
                            "id": "https://openalex.org/W1",
                            "title": "Deep Learning",
                            "abstract_inverted_index": {"Deep": [0], "nets": [1]}
                        }))),
                        // OpenAlex having a bad day
                        "W500" | "W501" => Err(StatusCode::INTERNAL_SERVER_ERROR),
                        _ => Err(StatusCode::NOT_FOUND),
                    }
                }),
            );
        (spawn(router).await, seen)
    }

    async fn app_with(model: Option<Arc<dyn ChatModel>>, origins: &[String]) -> (Router, Indexer, Seen) {
        let (base, seen) = openalex_stub().await;
        let indexer = Indexer::new(Arc::new(MemoryStore::new()), Arc::new(HashEmbedder::default()));
        let state = AppState::new(OpenAlexClient::new(base, None).unwrap(), indexer.clone(), model);
        (build_router(state, origins, Duration::from_secs(30)), indexer, seen)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _, _) = app_with(None, &[]).await;
        let (status, body) = get_json(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["backend"], "memory");
        assert_eq!(body["database"]["connected"], false);
        assert!(body["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn test_search_deep_learning() {
        let (app, _, seen) = app_with(None, &[]).await;
        let (status, body) = get_json(app, "/api/agent/acm/search?query=deep+learning&limit=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "deep learning");
        assert_eq!(body["limit"], 3);
        assert_eq!(body["count"], 2);
        assert_eq!(body["results"][0]["id"], "W1");
        assert_eq!(body["results"][0]["authors"][0], "Yann LeCun");
        assert_eq!(body["results"][1]["is_acm"], true);

        let requests = seen.lock().unwrap();
        assert_eq!(requests[0]["search"], "deep learning");
        assert_eq!(requests[0]["per-page"], "3");
    }

    #[tokio::test]
    async fn test_search_validates_query_and_clamps_limit() {
        let (app, _, seen) = app_with(None, &[]).await;
        let (status, body) = get_json(app.clone(), "/api/agent/acm/search?query=%20%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, _) = get_json(app.clone(), "/api/agent/acm/search?query=x&limit=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_json(app, "/api/agent/acm/search?query=x&limit=500&year=2020").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 50);
        let requests = seen.lock().unwrap();
        let last = requests.last().unwrap();
        assert_eq!(last["per-page"], "50");
        assert_eq!(last["filter"], "type:article,publication_year:2020");
    }

    #[tokio::test]
    async fn test_paper_lookup() {
        let (app, indexer, _) = app_with(None, &[]).await;
        indexer
            .store()
            .upsert_paper(&record("W77", "Only In The Store"))
            .await
            .unwrap();

        let (status, body) = get_json(app.clone(), "/api/agent/acm/papers/W1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Deep Learning");
        assert_eq!(body["abstract"], "Deep nets");
        assert_eq!(body["indexed"], false);

        let (status, body) = get_json(app.clone(), "/api/agent/acm/papers/W77").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Only In The Store");
        assert_eq!(body["indexed"], true);

        let (status, body) = get_json(app, "/api/agent/acm/papers/W404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "paper 'W404' not found");
    }

    #[tokio::test]
    async fn test_paper_lookup_survives_openalex_errors() {
        let (app, indexer, _) = app_with(None, &[]).await;
        indexer
            .store()
            .upsert_paper(&record("W500", "Stored Before The Outage"))
            .await
            .unwrap();

        let (status, body) = get_json(app.clone(), "/api/agent/acm/papers/W500").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Stored Before The Outage");
        assert_eq!(body["indexed"], true);

        let (status, _) = get_json(app, "/api/agent/acm/papers/W501").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_library_stats() {
        let (app, indexer, _) = app_with(None, &[]).await;
        indexer
            .index_text(record("W5", "Indexed"), "some indexed text about graphs")
            .await
            .unwrap();
        let (status, body) = get_json(app, "/api/library/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paper_count"], 1);
        assert_eq!(body["chunk_count"], 1);
        assert_eq!(body["backend"], "memory");
    }

    fn ask_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/agent/acm/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ask_without_model_is_503() {
        let (app, _, _) = app_with(None, &[]).await;
        let response = app.oneshot(ask_request(r#"{"question": "why?"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ask_with_model() {
        let (app, indexer, _) = app_with(Some(Arc::new(EchoModel)), &[]).await;
        indexer
            .index_text(record("W5", "Graphs"), "message passing on graphs")
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(ask_request(r#"{"question": "What is message passing?", "paper_id": "W5"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["answer"], "echo: Question: What is message passing?");
        assert_eq!(body["sources"][0]["paper_id"], "W5");

        let response = app.oneshot(ask_request(r#"{"question": "  "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/api/agent/acm/search")
            .header("origin", origin)
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_preflight_follows_allow_list() {
        let frontend = "https://acm-frontend.up.railway.app";

        let (app, _, _) = app_with(None, &[]).await;
        let response = app.clone().oneshot(preflight(frontend)).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
        let response = app.oneshot(preflight("http://localhost:3000")).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );

        let (app, _, _) = app_with(None, &[format!("{}/", frontend)]).await;
        let response = app.oneshot(preflight(frontend)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], frontend);
    }

    #[tokio::test]
    async fn test_cors_wildcard_is_permissive() {
        let (app, _, _) = app_with(None, &["*".to_string()]).await;
        let response = app.oneshot(preflight("https://anywhere.example")).await.unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
