use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::store::{cosine_similarity, ChunkRecord, PaperRecord, PaperStore, ScoredChunk, StoreStats};

#[derive(Default)]
struct Inner {
    papers: BTreeMap<String, PaperRecord>,
    chunks: Vec<ChunkRecord>,
}

/// Process-local store used when no database is configured
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaperStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert_paper(&self, paper: &PaperRecord) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.papers.insert(paper.paper_id.clone(), paper.clone());
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[ChunkRecord]) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        inner.chunks.extend_from_slice(chunks);
        Ok(chunks.len())
    }

    async fn get_paper(&self, paper_id: &str) -> StoreResult<Option<PaperRecord>> {
        Ok(self.inner.read().await.papers.get(paper_id).cloned())
    }

    async fn search_papers(&self, query: &str, limit: usize) -> StoreResult<Vec<PaperRecord>> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .papers
            .values()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn semantic_search(
        &self,
        embedding: &[f32],
        paper_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ScoredChunk>> {
        let inner = self.inner.read().await;
        let mut scored: Vec<ScoredChunk> = inner
            .chunks
            .iter()
            .filter(|c| paper_id.map_or(true, |id| c.paper_id == id))
            .filter(|c| c.embedding.len() == embedding.len())
            .map(|c| ScoredChunk {
                score: cosine_similarity(&c.embedding, embedding),
                chunk: c.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete_paper(&self, paper_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.papers.remove(paper_id).is_some();
        let before = inner.chunks.len();
        inner.chunks.retain(|c| c.paper_id != paper_id);
        Ok(existed || inner.chunks.len() != before)
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let inner = self.inner.read().await;
        Ok(StoreStats {
            paper_count: inner.papers.len() as u64,
            chunk_count: inner.chunks.len() as u64,
        })
    }
}
