use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use scholar_chat::{build_model, ChatModel};
use scholar_core::config::ScholarConfig;
use scholar_index::{open_indexer, Indexer};
use scholar_search::OpenAlexClient;
use tracing::{info, warn};

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub openalex: OpenAlexClient,
    pub indexer: Indexer,
    /// `None` when no LLM credentials are configured; `/ask` then answers 503
    pub model: Option<Arc<dyn ChatModel>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(openalex: OpenAlexClient, indexer: Indexer, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self {
            openalex,
            indexer,
            model,
            started_at: Instant::now(),
        }
    }

    /// Wire clients and the paper store from configuration
    pub async fn from_config(config: &ScholarConfig) -> Result<Self> {
        let openalex = OpenAlexClient::from_config(config)?;
        let indexer = open_indexer(config).await;
        let model = match build_model(&config.llm, None) {
            Ok(model) => {
                info!("Question answering enabled ({})", model.model_name());
                Some(model)
            }
            Err(e) => {
                warn!("Question answering disabled: {}", e);
                None
            }
        };
        Ok(Self::new(openalex, indexer, model))
    }
}
