//! scholar-chat - talk to papers through a configurable LLM
//!
//! [`llm`] holds the provider clients, [`answer`] the retrieval step shared
//! with the HTTP service, and [`engine`] the stateful session behind
//! `acm chat`.

pub mod answer;
pub mod engine;
pub mod error;
pub mod llm;

pub use answer::{answer_question, Answer, SourceRef, CONTEXT_CHUNKS};
pub use engine::{ChatEngine, ChatMode, SummaryLength};
pub use error::{ChatError, ChatResult};
pub use llm::{
    build_model, parse_json_reply, ChatMessage, ChatModel, ChatRequest, GeminiModel,
    OpenAiCompatible, Role,
};
