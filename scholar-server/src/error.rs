//! API error type with `IntoResponse`
//!
//! Every failure leaves the service as `{"error": <message>, "status": <code>}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scholar_chat::ChatError;
use scholar_index::StoreError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or missing input (400)
    BadRequest { message: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Feature not configured on this deployment (503)
    Unavailable { message: String },

    /// OpenAlex or the LLM provider failed (502)
    Upstream { message: String },

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest { message }
            | Self::Unavailable { message }
            | Self::Upstream { message } => message.clone(),
            Self::NotFound { resource, id } => format!("{} '{}' not found", resource, id),
            // Details stay in the log
            Self::Internal { .. } => "an internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal { message } => tracing::error!("Internal error: {}", message),
            Self::Upstream { message } => tracing::warn!("Upstream error: {}", message),
            _ => {}
        }

        let body = json!({
            "error": self.message(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Upstream { .. } | ChatError::Request(_) | ChatError::InvalidResponse(_) => {
                Self::Upstream {
                    message: e.to_string(),
                }
            }
            ChatError::MissingApiKey { .. } => Self::Unavailable {
                message: e.to_string(),
            },
            ChatError::NoPaperLoaded => Self::bad_request(e.to_string()),
            _ => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn bad_request_is_400_with_json_body() {
        let (status, body) = body_json(ApiError::bad_request("query is required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "query is required");
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let (status, body) = body_json(ApiError::Internal {
            message: "password=hunter2".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "an internal error occurred");
    }

    #[test]
    fn chat_errors_map_to_statuses() {
        let missing = ApiError::from(ChatError::MissingApiKey {
            provider: "gemini".into(),
        });
        assert_eq!(missing.status(), StatusCode::SERVICE_UNAVAILABLE);

        let upstream = ApiError::from(ChatError::Upstream {
            provider: "gemini".into(),
            status: 429,
            body: "quota".into(),
        });
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn not_found_message() {
        let err = ApiError::NotFound {
            resource: "paper",
            id: "W1".into(),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "paper 'W1' not found");
    }
}
