//! PDF → text → chunks → embeddings → store

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use scholar_core::chunk::{chunk_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use scholar_core::work::Work;
use serde::Serialize;
use tracing::{info, instrument};

use crate::embed::Embedder;
use crate::pdf;
use crate::store::{ChunkRecord, PaperRecord, PaperStore, ScoredChunk};

pub const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub paper_id: String,
    pub chunk_count: usize,
}

/// Indexes papers into a store and retrieves chunks back out
#[derive(Clone)]
pub struct Indexer {
    store: Arc<dyn PaperStore>,
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Indexer {
    pub fn new(store: Arc<dyn PaperStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    pub fn store(&self) -> &Arc<dyn PaperStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Extract a downloaded PDF and index it under the work's short id
    #[instrument(skip(self, work), fields(paper_id = %work.short_id()))]
    pub async fn index_pdf(&self, work: &Work, path: &Path) -> Result<IndexReport> {
        let text = pdf::extract_text(path).await?;
        let record = PaperRecord::from_work(work, Some(path.display().to_string()));
        self.index_text(record, &text).await
    }

    /// Replace whatever is stored for `record.paper_id` with freshly embedded chunks
    pub async fn index_text(&self, record: PaperRecord, text: &str) -> Result<IndexReport> {
        let pieces = chunk_text(text, self.chunk_size, self.chunk_overlap)?;
        if pieces.is_empty() {
            anyhow::bail!("No text to index for {}", record.paper_id);
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        for (batch_no, batch) in pieces.chunks(EMBED_BATCH_SIZE).enumerate() {
            let vectors = self
                .embedder
                .embed(batch)
                .await
                .with_context(|| format!("Embedding batch {} failed", batch_no + 1))?;
            for (offset, (content, embedding)) in batch.iter().zip(vectors).enumerate() {
                chunks.push(ChunkRecord {
                    paper_id: record.paper_id.clone(),
                    ordinal: (batch_no * EMBED_BATCH_SIZE + offset) as u32,
                    content: content.clone(),
                    embedding,
                });
            }
        }

        self.store.delete_paper(&record.paper_id).await?;
        self.store.upsert_paper(&record).await?;
        let stored = self.store.add_chunks(&chunks).await?;

        info!("Indexed {} ({} chunks, {})", record.paper_id, stored, self.embedder.name());
        Ok(IndexReport {
            paper_id: record.paper_id,
            chunk_count: stored,
        })
    }

    /// Chunks most similar to `query`, optionally scoped to one paper
    pub async fn retrieve(
        &self,
        query: &str,
        paper_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedder.embed_query(query).await?;
        Ok(self.store.semantic_search(&embedding, paper_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::memory::MemoryStore;
    use chrono::Utc;

    fn indexer() -> Indexer {
        Indexer::new(Arc::new(MemoryStore::new()), Arc::new(HashEmbedder::default()))
            .with_chunking(60, 10)
    }

    fn record(id: &str) -> PaperRecord {
        PaperRecord {
            paper_id: id.into(),
            title: format!("Paper {}", id),
            authors: vec![],
            year: None,
            abstract_text: None,
            doi: None,
            local_path: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_index_and_retrieve() {
        let indexer = indexer();
        let text = "Transformers rely on self attention to relate tokens. \
                    Convolutional networks use local receptive fields instead. \
                    Recurrent networks process tokens sequentially with hidden state.";

        let report = indexer.index_text(record("W1"), text).await.unwrap();
        assert_eq!(report.paper_id, "W1");
        assert!(report.chunk_count >= 3);

        let stats = indexer.store().stats().await.unwrap();
        assert_eq!(stats.paper_count, 1);
        assert_eq!(stats.chunk_count as usize, report.chunk_count);

        let hits = indexer.retrieve("self attention transformers", Some("W1"), 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].chunk.content.contains("attention"));
    }

    #[tokio::test]
    async fn test_reindex_replaces_chunks() {
        let indexer = indexer();
        indexer.index_text(record("W1"), &"alpha beta gamma ".repeat(20)).await.unwrap();
        let report = indexer.index_text(record("W1"), "short text").await.unwrap();
        assert_eq!(report.chunk_count, 1);
        assert_eq!(indexer.store().stats().await.unwrap().chunk_count, 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_error() {
        let indexer = indexer();
        assert!(indexer.index_text(record("W1"), "   ").await.is_err());
        assert_eq!(indexer.store().stats().await.unwrap().paper_count, 0);
    }

    #[tokio::test]
    async fn test_ordinals_span_batches() {
        let indexer = Indexer::new(Arc::new(MemoryStore::new()), Arc::new(HashEmbedder::default()))
            .with_chunking(10, 0);
        let text = "x".repeat(10 * (EMBED_BATCH_SIZE + 5));
        let report = indexer.index_text(record("W2"), &text).await.unwrap();
        assert_eq!(report.chunk_count, EMBED_BATCH_SIZE + 5);

        let hits = indexer
            .store()
            .semantic_search(&HashEmbedder::default().embed_one(&"x".repeat(10)), Some("W2"), 100)
            .await
            .unwrap();
        let mut ordinals: Vec<u32> = hits.iter().map(|h| h.chunk.ordinal).collect();
        ordinals.sort_unstable();
        assert_eq!(ordinals, (0..(EMBED_BATCH_SIZE + 5) as u32).collect::<Vec<_>>());
    }
}
