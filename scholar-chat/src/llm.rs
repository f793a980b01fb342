//! Chat completion clients
//!
//! Two wire formats cover the four providers: OpenAI's `/chat/completions`
//! (OpenAI, DeepSeek, Ollama) and Gemini's `generateContent`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scholar_core::config::{LlmConfig, LlmProvider};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ChatError, ChatResult};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One completion call: optional system instruction plus the conversation
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Single user turn
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![ChatMessage::user(text)],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Prepend earlier turns before the current prompt
    pub fn history(mut self, history: &[ChatMessage]) -> Self {
        let mut messages = history.to_vec();
        messages.append(&mut self.messages);
        self.messages = messages;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> ChatResult<String>;
}

/// Build the client for the configured provider; `override_model` wins over `llm.model`
pub fn build_model(llm: &LlmConfig, override_model: Option<&str>) -> ChatResult<Arc<dyn ChatModel>> {
    let provider = llm.provider();
    let model = override_model
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| llm.effective_model());
    let base_url = llm.base_url.as_deref().filter(|u| !u.trim().is_empty());

    let key = match (llm.api_key(), provider.requires_api_key()) {
        (Some(key), _) => Some(key),
        (None, false) => None,
        (None, true) => {
            return Err(ChatError::MissingApiKey {
                provider: provider.to_string(),
            })
        }
    };

    let client: Arc<dyn ChatModel> = match provider {
        LlmProvider::Gemini => Arc::new(GeminiModel::new(
            key.unwrap_or_default(),
            &model,
            base_url.unwrap_or(GEMINI_BASE_URL),
        )),
        LlmProvider::OpenAi => Arc::new(OpenAiCompatible::new(
            "openai",
            base_url.unwrap_or(OPENAI_BASE_URL),
            key,
            &model,
        )),
        LlmProvider::DeepSeek => Arc::new(OpenAiCompatible::new(
            "deepseek",
            base_url.unwrap_or(DEEPSEEK_BASE_URL),
            key,
            &model,
        )),
        LlmProvider::Ollama => Arc::new(OpenAiCompatible::new(
            "ollama",
            base_url.unwrap_or(OLLAMA_BASE_URL),
            key,
            &model,
        )),
    };
    debug!("Chat model: {} ({})", client.model_name(), provider);
    Ok(client)
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(CHAT_TIMEOUT)
        .build()
        .unwrap_or_default()
}

async fn upstream_error(provider: &str, response: reqwest::Response) -> ChatError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ChatError::Upstream {
        provider: provider.to_string(),
        status,
        body: body.chars().take(500).collect(),
    }
}

/// `/chat/completions` speaker: OpenAI, DeepSeek and Ollama
pub struct OpenAiCompatible {
    http: reqwest::Client,
    provider: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatible {
    pub fn new(provider: &str, base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            http: http_client(),
            provider: provider.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            model: model.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionReply,
}

#[derive(Deserialize)]
struct CompletionReply {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiCompatible {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(provider = %self.provider, model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> ChatResult<String> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(CompletionMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m| CompletionMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &m.content,
        }));

        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(upstream_error(&self.provider, response).await);
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::InvalidResponse(format!("{} returned no choices", self.provider)))
    }
}

/// Gemini `models/{model}:generateContent`
pub struct GeminiModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            http: http_client(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> ChatResult<String> {
        let body = GenerateRequest {
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: s.clone() }],
            }),
            contents: request
                .messages
                .iter()
                .map(|m| GeminiContent {
                    role: Some(match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }),
                    parts: vec![GeminiPart {
                        text: m.content.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let response = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error("gemini", response).await);
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ChatError::InvalidResponse("gemini returned no text".into()));
        }
        Ok(text)
    }
}

/// Parse a model reply that should be JSON, tolerating a ```json fence
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> ChatResult<T> {
    let mut body = reply.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    Ok(serde_json::from_str(body.trim())?)
}
