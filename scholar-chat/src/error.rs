use scholar_core::ScholarError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    /// Paper mode needs a loaded paper
    #[error("No paper loaded. Use /paper <id> or pass a paper id")]
    NoPaperLoaded,

    #[error("No API key configured for {provider}. Run: acm config init")]
    MissingApiKey { provider: String },

    /// Provider answered with a non-success status
    #[error("{provider} request failed ({status}): {body}")]
    Upstream {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected LLM response: {0}")]
    InvalidResponse(String),

    #[error("Reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] ScholarError),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;
