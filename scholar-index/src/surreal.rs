//! SurrealDB paper store over websocket RPC
//!
//! Two SCHEMALESS tables:
//! - `paper`: one record per paper, record id `paper:<paper_id>`
//! - `chunk`: text chunks with their embedding, linked by `paper_id`
//!
//! Every value reaches SurrealQL through `.bind(...)`; statement text never
//! contains user input.

use std::time::Duration;

use async_trait::async_trait;
use scholar_core::config::DatabaseConfig;
use serde::Deserialize;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{ChunkRecord, PaperRecord, PaperStore, ScoredChunk, StoreStats};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const PAPER_FIELDS: &str =
    "paper_id, title, authors, year, abstract_text, doi, local_path, created_at";

pub struct SurrealStore {
    db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ScoredRow {
    paper_id: String,
    ordinal: u32,
    content: String,
    embedding: Vec<f32>,
    score: Option<f32>,
}

impl SurrealStore {
    /// Connect, sign in as root, select namespace/database and define tables
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let raw = config.url.as_deref().unwrap_or_default();
        let address = normalize_address(raw);

        let db = tokio::time::timeout(CONNECT_TIMEOUT, any::connect(address.clone()))
            .await
            .map_err(|_| StoreError::ConnectTimeout {
                url: address.clone(),
            })?
            .map_err(|source| StoreError::Connect {
                url: address.clone(),
                source,
            })?;

        if let (Some(user), Some(password)) = (config.user.as_deref(), config.password.as_deref()) {
            db.signin(Root {
                username: user,
                password,
            })
            .await
            .map_err(|source| StoreError::Connect {
                url: address.clone(),
                source,
            })?;
        } else {
            debug!("No database credentials configured, connecting anonymously");
        }

        db.use_ns(config.namespace().to_string())
            .use_db(config.database().to_string())
            .await?;

        let store = Self { db };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> StoreResult<()> {
        self.db
            .query(
                "
                DEFINE TABLE IF NOT EXISTS paper SCHEMALESS;
                DEFINE TABLE IF NOT EXISTS chunk SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS chunk_paper ON chunk FIELDS paper_id;
                ",
            )
            .await?
            .check()?;
        Ok(())
    }
}

/// Websocket address for the SDK: the `/rpc` suffix and trailing slash are implied
pub fn normalize_address(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/rpc")
        .unwrap_or(trimmed)
        .to_string()
}

#[async_trait]
impl PaperStore for SurrealStore {
    fn backend(&self) -> &'static str {
        "surrealdb"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.health().await?;
        Ok(())
    }

    async fn upsert_paper(&self, paper: &PaperRecord) -> StoreResult<()> {
        self.db
            .query("UPSERT type::thing('paper', $paper_id) CONTENT $record;")
            .bind(("paper_id", paper.paper_id.clone()))
            .bind(("record", paper.clone()))
            .await?
            .check()?;
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[ChunkRecord]) -> StoreResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        self.db
            .query("INSERT INTO chunk $chunks;")
            .bind(("chunks", chunks.to_vec()))
            .await?
            .check()?;
        Ok(chunks.len())
    }

    async fn get_paper(&self, paper_id: &str) -> StoreResult<Option<PaperRecord>> {
        let mut response = self
            .db
            .query(format!(
                "SELECT {} FROM paper WHERE paper_id = $paper_id LIMIT 1;",
                PAPER_FIELDS
            ))
            .bind(("paper_id", paper_id.to_string()))
            .await?;
        let rows: Vec<PaperRecord> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn search_papers(&self, query: &str, limit: usize) -> StoreResult<Vec<PaperRecord>> {
        let mut response = self
            .db
            .query(format!(
                "SELECT {} FROM paper \
                 WHERE string::lowercase(title) CONTAINS string::lowercase($query) \
                 ORDER BY title LIMIT $limit;",
                PAPER_FIELDS
            ))
            .bind(("query", query.to_string()))
            .bind(("limit", limit as u64))
            .await?;
        Ok(response.take(0)?)
    }

    async fn semantic_search(
        &self,
        embedding: &[f32],
        paper_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ScoredChunk>> {
        let scope = if paper_id.is_some() {
            "AND paper_id = $paper_id"
        } else {
            ""
        };
        let sql = format!(
            "SELECT paper_id, ordinal, content, embedding, \
             vector::similarity::cosine(embedding, $embedding) AS score \
             FROM chunk WHERE array::len(embedding) = $dim {} \
             ORDER BY score DESC LIMIT $limit;",
            scope
        );

        let mut query = self
            .db
            .query(sql)
            .bind(("embedding", embedding.to_vec()))
            .bind(("dim", embedding.len() as u64))
            .bind(("limit", limit as u64));
        if let Some(id) = paper_id {
            query = query.bind(("paper_id", id.to_string()));
        }

        let mut response = query.await?;
        let rows: Vec<ScoredRow> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|row| ScoredChunk {
                score: row.score.unwrap_or(0.0),
                chunk: ChunkRecord {
                    paper_id: row.paper_id,
                    ordinal: row.ordinal,
                    content: row.content,
                    embedding: row.embedding,
                },
            })
            .collect())
    }

    async fn delete_paper(&self, paper_id: &str) -> StoreResult<bool> {
        let existed = self.get_paper(paper_id).await?.is_some();
        self.db
            .query(
                "
                DELETE chunk WHERE paper_id = $paper_id;
                DELETE type::thing('paper', $paper_id);
                ",
            )
            .bind(("paper_id", paper_id.to_string()))
            .await?
            .check()?;
        Ok(existed)
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let mut response = self
            .db
            .query(
                "
                SELECT count() AS count FROM paper GROUP ALL;
                SELECT count() AS count FROM chunk GROUP ALL;
                ",
            )
            .await?;
        let papers: Option<CountRow> = response.take(0)?;
        let chunks: Option<CountRow> = response.take(1)?;
        Ok(StoreStats {
            paper_count: papers.map(|r| r.count).unwrap_or(0),
            chunk_count: chunks.map(|r| r.count).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("ws://surrealdb.railway.internal:8000/rpc"),
            "ws://surrealdb.railway.internal:8000"
        );
        assert_eq!(normalize_address("wss://db.example.com/rpc/"), "wss://db.example.com");
        assert_eq!(normalize_address(" ws://localhost:8000 "), "ws://localhost:8000");
    }

    /// Needs a running server: `surreal start --user root --pass root`
    #[tokio::test]
    #[ignore]
    async fn test_live_roundtrip() {
        let config = DatabaseConfig {
            url: Some(
                std::env::var("SURREAL_URL").unwrap_or_else(|_| "ws://127.0.0.1:8000/rpc".into()),
            ),
            user: Some("root".into()),
            password: Some("root".into()),
            namespace: Some("acm_scholar_test".into()),
            database: Some(format!("t{}", Utc::now().timestamp_millis())),
        };
        let store = SurrealStore::connect(&config).await.unwrap();
        store.ping().await.unwrap();

        let paper = PaperRecord {
            paper_id: "W1".into(),
            title: "Bound Parameters O'Brien".into(),
            authors: vec!["A".into()],
            year: Some(2024),
            abstract_text: None,
            doi: None,
            local_path: None,
            created_at: Utc::now(),
        };
        store.upsert_paper(&paper).await.unwrap();
        store
            .add_chunks(&[ChunkRecord {
                paper_id: "W1".into(),
                ordinal: 0,
                content: "text".into(),
                embedding: vec![1.0, 0.0],
            }])
            .await
            .unwrap();

        assert_eq!(store.get_paper("W1").await.unwrap().unwrap().title, paper.title);
        assert_eq!(store.search_papers("o'brien", 5).await.unwrap().len(), 1);
        let hits = store.semantic_search(&[1.0, 0.0], Some("W1"), 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            store.stats().await.unwrap(),
            StoreStats {
                paper_count: 1,
                chunk_count: 1
            }
        );
        assert!(store.delete_paper("W1").await.unwrap());
        assert_eq!(store.stats().await.unwrap(), StoreStats::default());
    }
}
