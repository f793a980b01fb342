//! Paper store abstraction
//!
//! Papers and their embedded text chunks live behind [`PaperStore`]. The
//! backend service and the CLI share one `Arc<dyn PaperStore>`; which
//! implementation sits behind it depends on whether a database URL is
//! configured.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scholar_core::config::DatabaseConfig;
use scholar_core::work::Work;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::surreal::SurrealStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub paper_id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub local_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaperRecord {
    pub fn from_work(work: &Work, local_path: Option<String>) -> Self {
        Self {
            paper_id: work.short_id().to_string(),
            title: work.display_title().to_string(),
            authors: work.author_names(usize::MAX),
            year: work.publication_year,
            abstract_text: work.abstract_text(),
            doi: work.bare_doi().map(str::to_string),
            local_path,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub paper_id: String,
    pub ordinal: u32,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: ChunkRecord,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub paper_count: u64,
    pub chunk_count: u64,
}

/// Storage for indexed papers and chunk embeddings
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Short backend name reported by `/api/health`
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    async fn upsert_paper(&self, paper: &PaperRecord) -> StoreResult<()>;

    async fn add_chunks(&self, chunks: &[ChunkRecord]) -> StoreResult<usize>;

    async fn get_paper(&self, paper_id: &str) -> StoreResult<Option<PaperRecord>>;

    /// Case-insensitive title substring search
    async fn search_papers(&self, query: &str, limit: usize) -> StoreResult<Vec<PaperRecord>>;

    /// Chunks by cosine similarity, best first, optionally scoped to one paper
    ///
    /// Chunks whose embedding dimension differs from the query are skipped.
    async fn semantic_search(
        &self,
        embedding: &[f32],
        paper_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ScoredChunk>>;

    /// Delete a paper and its chunks; false when it wasn't stored
    async fn delete_paper(&self, paper_id: &str) -> StoreResult<bool>;

    async fn stats(&self) -> StoreResult<StoreStats>;
}

/// Cosine similarity; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// SurrealDB when a URL is configured and reachable, in-memory otherwise
pub async fn open_store(config: &DatabaseConfig) -> Arc<dyn PaperStore> {
    if !config.is_configured() {
        warn!("No database configured; using in-memory store (nothing is persisted)");
        return Arc::new(MemoryStore::new());
    }

    match SurrealStore::connect(config).await {
        Ok(store) => {
            info!(
                "Connected to SurrealDB ({}/{})",
                config.namespace(),
                config.database()
            );
            Arc::new(store)
        }
        Err(e) => {
            warn!("{}; falling back to in-memory store", e);
            Arc::new(MemoryStore::new())
        }
    }
}
