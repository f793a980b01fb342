//! scholar-index - paper storage, embeddings and the indexing pipeline
//!
//! ```text
//! PDF ─ pdf::extract_text ─ chunk_text ─ Embedder ─ PaperStore
//!                                                   ├─ SurrealStore (ws RPC)
//!                                                   └─ MemoryStore  (fallback)
//! ```

pub mod embed;
pub mod error;
pub mod memory;
pub mod pdf;
pub mod pipeline;
pub mod store;
pub mod surreal;

use scholar_core::config::ScholarConfig;

pub use embed::{build_embedder, Embedder, GeminiEmbedder, HashEmbedder, OpenAiEmbedder};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pipeline::{IndexReport, Indexer};
pub use store::{open_store, ChunkRecord, PaperRecord, PaperStore, ScoredChunk, StoreStats};
pub use surreal::SurrealStore;

/// Store and embedder wired from configuration
pub async fn open_indexer(config: &ScholarConfig) -> Indexer {
    let store = open_store(&config.database).await;
    let embedder = build_embedder(&config.llm);
    Indexer::new(store, embedder)
}
