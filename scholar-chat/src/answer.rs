//! Retrieval-augmented answering shared by the chat engine and the HTTP `/ask` route

use scholar_index::{Indexer, ScoredChunk};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ChatResult;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};

/// Chunks handed to the model per question
pub const CONTEXT_CHUNKS: usize = 5;

const EXCERPT_CHARS: usize = 160;

/// A retrieved chunk cited in an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub paper_id: String,
    pub ordinal: u32,
    pub score: f32,
    pub excerpt: String,
}

impl SourceRef {
    fn from_chunk(hit: &ScoredChunk) -> Self {
        let content = hit.chunk.content.trim();
        let mut excerpt: String = content.chars().take(EXCERPT_CHARS).collect();
        if content.chars().count() > EXCERPT_CHARS {
            excerpt.push_str("...");
        }
        Self {
            paper_id: hit.chunk.paper_id.clone(),
            ordinal: hit.chunk.ordinal,
            score: hit.score,
            excerpt,
        }
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} #{} ({:.2}): {}",
            self.paper_id, self.ordinal, self.score, self.excerpt
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// System instruction for conversations about one paper
pub fn paper_system_instruction(paper_id: &str) -> String {
    format!(
        "You are an academic paper assistant helping the user understand paper {}.\n\
         Answer from the paper's content. If you are not sure, say so explicitly.\n\
         Answers should be professional, accurate and helpful.",
        paper_id
    )
}

/// Top chunks for `question`; a failing store degrades to no context
pub async fn retrieve_context(
    indexer: Option<&Indexer>,
    question: &str,
    paper_id: Option<&str>,
    limit: usize,
) -> Vec<ScoredChunk> {
    let Some(indexer) = indexer else {
        return Vec::new();
    };
    match indexer.retrieve(question, paper_id, limit).await {
        Ok(hits) => {
            debug!("Retrieved {} chunks for context", hits.len());
            hits
        }
        Err(e) => {
            warn!("Retrieval failed, answering without context: {:#}", e);
            Vec::new()
        }
    }
}

/// Render retrieved chunks as a numbered context block
pub fn context_block(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] ({} #{})\n{}",
                i + 1,
                hit.chunk.paper_id,
                hit.chunk.ordinal,
                hit.chunk.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(question: &str, paper_scoped: bool, context: &str) -> String {
    let mut prompt = if paper_scoped {
        format!(
            "Based on the content of the paper, please answer the following question:\n\n\
             Question: {}\n\n\
             Please provide a detailed answer based on the paper's content. \
             If the answer cannot be found in the paper, please say so.",
            question
        )
    } else {
        format!(
            "Based on the documents in the library, please answer the following question:\n\n\
             Question: {}\n\n\
             Please search through all available documents and provide a comprehensive answer. \
             Cite the sources you used.",
            question
        )
    };
    if !context.is_empty() {
        prompt.push_str("\n\nRelevant excerpts:\n\n");
        prompt.push_str(context);
    }
    prompt
}

/// Answer `question` about one paper (`paper_id`) or the whole library (`None`)
pub async fn answer_question(
    model: &dyn ChatModel,
    indexer: Option<&Indexer>,
    question: &str,
    paper_id: Option<&str>,
    history: &[ChatMessage],
) -> ChatResult<Answer> {
    let hits = retrieve_context(indexer, question, paper_id, CONTEXT_CHUNKS).await;
    let prompt = build_prompt(question, paper_id.is_some(), &context_block(&hits));

    let mut request = ChatRequest::prompt(prompt).history(history);
    if let Some(id) = paper_id {
        request = request.system(paper_system_instruction(id));
    }

    let answer = model.complete(&request).await?;
    Ok(Answer {
        answer,
        sources: hits.iter().map(SourceRef::from_chunk).collect(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::ChatResult;
    use crate::llm::{ChatModel, ChatRequest};

    /// Returns canned replies in order and records every request
    pub struct ScriptedModel {
        name: String,
        replies: Mutex<Vec<String>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        pub fn new(replies: &[&str]) -> Self {
            Self {
                name: "scripted".into(),
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn last_prompt(&self) -> String {
            let requests = self.requests.lock().unwrap();
            requests
                .last()
                .and_then(|r| r.messages.last())
                .map(|m| m.content.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, request: &ChatRequest) -> ChatResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "no more replies".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;
    use chrono::Utc;
    use scholar_index::{HashEmbedder, MemoryStore, PaperRecord};
    use std::sync::Arc;

    fn record(id: &str) -> PaperRecord {
        PaperRecord {
            paper_id: id.into(),
            title: id.into(),
            authors: vec![],
            year: None,
            abstract_text: None,
            doi: None,
            local_path: None,
            created_at: Utc::now(),
        }
    }

    async fn indexer() -> Indexer {
        let indexer = Indexer::new(Arc::new(MemoryStore::new()), Arc::new(HashEmbedder::default()))
            .with_chunking(80, 0);
        indexer
            .index_text(record("W1"), "Graph neural networks aggregate neighbour features by message passing.")
            .await
            .unwrap();
        indexer
            .index_text(record("W2"), "Diffusion models generate images by iterative denoising.")
            .await
            .unwrap();
        indexer
    }

    #[tokio::test]
    async fn test_answer_without_store_has_no_sources() {
        let model = ScriptedModel::new(&["It depends."]);
        let answer = answer_question(&model, None, "What is a GNN?", None, &[])
            .await
            .unwrap();
        assert_eq!(answer.answer, "It depends.");
        assert!(answer.sources.is_empty());
        assert!(model.last_prompt().contains("documents in the library"));
        assert!(!model.last_prompt().contains("Relevant excerpts"));
    }

    #[tokio::test]
    async fn test_paper_scoped_answer_uses_only_that_paper() {
        let indexer = indexer().await;
        let model = ScriptedModel::new(&["Message passing."]);
        let answer = answer_question(&model, Some(&indexer), "message passing", Some("W1"), &[])
            .await
            .unwrap();

        assert!(!answer.sources.is_empty());
        assert!(answer.sources.iter().all(|s| s.paper_id == "W1"));
        let prompt = model.last_prompt();
        assert!(prompt.contains("content of the paper"));
        assert!(prompt.contains("neighbour features"));

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].system.as_deref().unwrap().contains("paper W1"));
    }

    #[tokio::test]
    async fn test_global_answer_searches_library() {
        let indexer = indexer().await;
        let model = ScriptedModel::new(&["Both."]);
        let answer = answer_question(&model, Some(&indexer), "denoising diffusion", None, &[])
            .await
            .unwrap();
        let papers: Vec<_> = answer.sources.iter().map(|s| s.paper_id.as_str()).collect();
        assert!(papers.contains(&"W1"));
        assert!(papers.contains(&"W2"));
        assert_eq!(answer.sources[0].paper_id, "W2");
    }

    #[test]
    fn test_source_excerpt_is_truncated() {
        let hit = ScoredChunk {
            chunk: scholar_index::ChunkRecord {
                paper_id: "W9".into(),
                ordinal: 3,
                content: "y".repeat(400),
                embedding: vec![],
            },
            score: 0.5,
        };
        let source = SourceRef::from_chunk(&hit);
        assert_eq!(source.excerpt.chars().count(), EXCERPT_CHARS + 3);
        assert!(source.to_string().starts_with("W9 #3 (0.50)"));
    }
}
