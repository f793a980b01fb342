//! Text embedders
//!
//! Remote embedders call the provider's embeddings API; [`HashEmbedder`] is a
//! deterministic local fallback so indexing and retrieval still work without
//! any key (DeepSeek, for instance, has no embeddings endpoint).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scholar_core::config::{LlmConfig, LlmProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";
pub const OLLAMA_EMBED_MODEL: &str = "nomic-embed-text";
pub const GEMINI_EMBED_MODEL: &str = "text-embedding-004";

pub const HASH_DIMENSIONS: usize = 256;

const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> String;

    /// One vector per input, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(&[query.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no vector returned"))
    }
}

/// Pick an embedder for the configured LLM provider
pub fn build_embedder(llm: &LlmConfig) -> Arc<dyn Embedder> {
    let embedder: Arc<dyn Embedder> = match (llm.provider(), llm.api_key()) {
        (LlmProvider::Gemini, Some(key)) => Arc::new(GeminiEmbedder::new(key, None)),
        (LlmProvider::OpenAi, Some(key)) => Arc::new(OpenAiEmbedder::new(
            llm.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
            Some(key),
            OPENAI_EMBED_MODEL,
        )),
        (LlmProvider::Ollama, _) => Arc::new(OpenAiEmbedder::new(
            llm.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL),
            None,
            OLLAMA_EMBED_MODEL,
        )),
        _ => Arc::new(HashEmbedder::default()),
    };
    info!("Using embedder: {}", embedder.name());
    embedder
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(EMBED_TIMEOUT)
        .build()
        .unwrap_or_default()
}

async fn fail(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let truncated: String = body.chars().take(500).collect();
    anyhow!("{} embeddings failed ({}): {}", provider, status, truncated)
}

/// OpenAI-compatible `/embeddings` endpoint (OpenAI, Ollama, gateways)
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> String {
        format!("openai-compatible:{}", self.model)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
            index: usize,
        }

        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to send embeddings request")?;
        if !response.status().is_success() {
            return Err(fail("OpenAI-compatible", response).await);
        }
        let response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embeddings response")?;

        let mut vectors = vec![None; inputs.len()];
        for data in response.data {
            if data.index < vectors.len() {
                vectors[data.index] = Some(data.embedding);
            }
        }

        vectors
            .into_iter()
            .enumerate()
            .map(|(idx, maybe)| maybe.ok_or_else(|| anyhow!("missing embedding for index {}", idx)))
            .collect()
    }
}

/// Gemini `batchEmbedContents`
pub struct GeminiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url
                .unwrap_or(GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: GEMINI_EMBED_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }

        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        struct EmbedRequest<'a> {
            model: String,
            content: Content<'a>,
        }

        #[derive(Serialize)]
        struct BatchRequest<'a> {
            requests: Vec<EmbedRequest<'a>>,
        }

        #[derive(Deserialize)]
        struct BatchResponse {
            #[serde(default)]
            embeddings: Vec<Values>,
        }

        #[derive(Deserialize)]
        struct Values {
            values: Vec<f32>,
        }

        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let model_path = format!("models/{}", self.model);
        let body = BatchRequest {
            requests: inputs
                .iter()
                .map(|text| EmbedRequest {
                    model: model_path.clone(),
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        let response = self
            .http
            .post(format!("{}/{}:batchEmbedContents", self.base_url, model_path))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send Gemini embeddings request")?;
        if !response.status().is_success() {
            return Err(fail("Gemini", response).await);
        }
        let response: BatchResponse = response
            .json()
            .await
            .context("Failed to parse Gemini embeddings response")?;

        if response.embeddings.len() != inputs.len() {
            anyhow::bail!(
                "Gemini returned {} embeddings for {} inputs",
                response.embeddings.len(),
                inputs.len()
            );
        }
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

/// Deterministic feature-hashing embedder
///
/// Lowercased alphanumeric tokens are hashed (FNV-1a) into a fixed number of
/// signed buckets and the result is L2-normalised. Texts sharing vocabulary
/// land close together, which is enough for keyword-ish retrieval.
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(HASH_DIMENSIONS)
    }
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 1)
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> String {
        format!("local-hash:{}", self.dimensions)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Hash-embedding {} inputs", inputs.len());
        Ok(inputs.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_hash_embedder_similarity() {
        let embedder = HashEmbedder::default();
        let vectors = embedder
            .embed(&[
                "graph neural networks for molecules".to_string(),
                "neural networks on graphs and molecules".to_string(),
                "query optimization in relational databases".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(vectors[0].len(), HASH_DIMENSIONS);
        let close = cosine_similarity(&vectors[0], &vectors[1]);
        let far = cosine_similarity(&vectors[0], &vectors[2]);
        assert!(close > far);

        assert_eq!(embedder.embed_one("Same Text"), embedder.embed_one("same text"));
        assert!(embedder.embed_one("").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_openai_embedder_reorders_by_index() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "text-embedding-3-small");
                Json(json!({
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                }))
            }),
        );
        let base = spawn(router).await;

        let embedder = OpenAiEmbedder::new(&format!("{}/v1", base), Some("sk-test"), OPENAI_EMBED_MODEL);
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_gemini_embedder() {
        let router = Router::new().route(
            "/v1beta/models/text-embedding-004:batchEmbedContents",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if headers.get("x-goog-api-key").map(|v| v.as_bytes()) != Some(b"g-key".as_slice()) {
                    return Err(StatusCode::UNAUTHORIZED);
                }
                let n = body["requests"].as_array().map(|r| r.len()).unwrap_or(0);
                let embeddings: Vec<Value> = (0..n).map(|i| json!({"values": [i as f32, 1.0]})).collect();
                Ok(Json(json!({"embeddings": embeddings})))
            }),
        );
        let base = spawn(router).await;

        let embedder = GeminiEmbedder::new("g-key", Some(&format!("{}/v1beta", base)));
        let vectors = embedder
            .embed(&["x".to_string(), "y".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[1], vec![1.0, 1.0]);

        let wrong = GeminiEmbedder::new("bad", Some(&format!("{}/v1beta", base)));
        let err = wrong.embed(&["x".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_build_embedder_selection() {
        let mut llm = LlmConfig::default();
        assert!(build_embedder(&llm).name().starts_with("local-hash"));

        llm.provider = Some(LlmProvider::DeepSeek);
        llm.api_key = Some("ds".into());
        assert!(build_embedder(&llm).name().starts_with("local-hash"));

        llm.provider = Some(LlmProvider::Ollama);
        llm.api_key = None;
        assert_eq!(build_embedder(&llm).name(), "openai-compatible:nomic-embed-text");

        llm.provider = Some(LlmProvider::Gemini);
        llm.api_key = Some("g".into());
        assert_eq!(build_embedder(&llm).name(), "gemini:text-embedding-004");
    }
}
