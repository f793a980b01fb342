//! Stateful chat session used by `acm chat`

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scholar_core::config::{LlmConfig, ScholarConfig};
use scholar_core::data::{DataStorage, GLOBAL_PAPER_ID};
use scholar_index::Indexer;
use tracing::{debug, info, warn};

use crate::answer::{
    answer_question, context_block, paper_system_instruction, retrieve_context, SourceRef,
};
use crate::error::{ChatError, ChatResult};
use crate::llm::{build_model, ChatMessage, ChatModel, ChatRequest};

/// Turns kept as conversation history (user + assistant messages)
pub const MAX_HISTORY: usize = 20;

const SUMMARY_CHUNKS: usize = 8;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "do", "does", "did", "what", "how", "why",
    "when", "where", "who", "which", "can", "could",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Questions about the loaded paper
    Paper,
    /// Questions across the whole library
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    fn instruction(&self) -> &'static str {
        match self {
            SummaryLength::Short => "Summarise the paper's main contribution in 1-2 paragraphs.",
            SummaryLength::Medium => {
                "Summarise the paper's main ideas, methodology and contributions in 3-5 paragraphs."
            }
            SummaryLength::Long => {
                "Summarise every part of the paper in detail, including background, method, experiments and conclusions."
            }
        }
    }
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SummaryLength::Short => "short",
            SummaryLength::Medium => "medium",
            SummaryLength::Long => "long",
        })
    }
}

impl FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(SummaryLength::Short),
            "medium" => Ok(SummaryLength::Medium),
            "long" => Ok(SummaryLength::Long),
            other => Err(format!("unknown summary length '{}' (short, medium, long)", other)),
        }
    }
}

pub struct ChatEngine {
    model: Arc<dyn ChatModel>,
    llm: LlmConfig,
    indexer: Option<Indexer>,
    storage: DataStorage,
    mode: ChatMode,
    current_paper: Option<String>,
    session_id: Option<String>,
    history: Vec<ChatMessage>,
    last_sources: Vec<SourceRef>,
}

impl ChatEngine {
    pub fn new(model: Arc<dyn ChatModel>, storage: DataStorage) -> Self {
        Self {
            model,
            llm: LlmConfig::default(),
            indexer: None,
            storage,
            mode: ChatMode::Paper,
            current_paper: None,
            session_id: None,
            history: Vec::new(),
            last_sources: Vec::new(),
        }
    }

    /// Engine for the configured provider, saving usage data under `~/.acm-scholar/data`
    pub fn from_config(config: &ScholarConfig, indexer: Option<Indexer>) -> ChatResult<Self> {
        let model = build_model(&config.llm, None)?;
        let mut engine = Self::new(model, DataStorage::open_default());
        engine.llm = config.llm.clone();
        engine.indexer = indexer;
        Ok(engine)
    }

    pub fn with_indexer(mut self, indexer: Indexer) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_llm_config(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn current_paper(&self) -> Option<&str> {
        self.current_paper.as_deref()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn storage(&self) -> &DataStorage {
        &self.storage
    }

    /// Focus the conversation on one paper and open a reading session for it
    pub fn load_paper(&mut self, paper_id: &str) -> ChatResult<()> {
        let paper_id = paper_id.trim();
        if paper_id.is_empty() {
            return Err(ChatError::NoPaperLoaded);
        }
        self.end_session();

        let session = self.storage.start_reading_session(paper_id)?;
        debug!("Reading session {} started for {}", session, paper_id);
        self.session_id = Some(session);
        self.current_paper = Some(paper_id.to_string());
        self.mode = ChatMode::Paper;
        self.history.clear();
        self.last_sources.clear();
        info!("Loaded paper {}", paper_id);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ChatMode) {
        if self.mode != mode {
            self.history.clear();
        }
        self.mode = mode;
    }

    /// Switch to another model of the configured provider
    pub fn set_model(&mut self, model: &str) -> ChatResult<()> {
        self.model = build_model(&self.llm, Some(model))?;
        info!("Switched model to {}", self.model.model_name());
        Ok(())
    }

    /// Answer a question in the current mode and record it as usage data
    pub async fn chat(&mut self, question: &str) -> ChatResult<String> {
        let paper_id = match self.mode {
            ChatMode::Paper => Some(
                self.current_paper
                    .clone()
                    .ok_or(ChatError::NoPaperLoaded)?,
            ),
            ChatMode::Global => None,
        };

        let answer = answer_question(
            self.model.as_ref(),
            self.indexer.as_ref(),
            question,
            paper_id.as_deref(),
            &self.history,
        )
        .await?;

        // Reading sessions track paper chats only
        if let (Some(session), ChatMode::Paper) = (&self.session_id, self.mode) {
            self.storage.add_question_to_session(session, question)?;
        }
        self.storage.save_qa_pair(
            paper_id.as_deref().unwrap_or(GLOBAL_PAPER_ID),
            question,
            &answer.answer,
            self.model.model_name(),
        )?;
        self.remember(question, &answer.answer);
        self.last_sources = answer.sources;
        Ok(answer.answer)
    }

    /// Summarise the loaded paper and keep the summary as a knowledge entry
    pub async fn summarize(&mut self, length: SummaryLength) -> ChatResult<String> {
        let paper_id = self.current_paper.clone().ok_or(ChatError::NoPaperLoaded)?;

        let mut context = String::new();
        if let Some(indexer) = &self.indexer {
            match indexer.store().get_paper(&paper_id).await {
                Ok(Some(record)) => {
                    context.push_str(&format!("Title: {}\n", record.title));
                    if let Some(abstract_text) = record.abstract_text {
                        context.push_str(&format!("Abstract: {}\n", abstract_text));
                    }
                }
                Ok(None) => debug!("{} is not in the paper store", paper_id),
                Err(e) => warn!("Paper lookup failed: {}", e),
            }
        }
        let hits = retrieve_context(
            self.indexer.as_ref(),
            "main contribution method experiments results conclusion",
            Some(&paper_id),
            SUMMARY_CHUNKS,
        )
        .await;
        if !hits.is_empty() {
            context.push_str("\nExcerpts:\n\n");
            context.push_str(&context_block(&hits));
        }

        let mut prompt = format!(
            "Please summarise this paper.\n\n{}\n\n\
             Keep the summary objective and accurate, covering the paper's core information.",
            length.instruction()
        );
        if !context.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(context.trim());
        }

        let request = ChatRequest::prompt(prompt).system(paper_system_instruction(&paper_id));
        let summary = self.model.complete(&request).await?;
        self.storage
            .save_knowledge(&paper_id, self.model.model_name(), &summary)?;
        Ok(summary)
    }

    pub fn last_sources(&self) -> &[SourceRef] {
        &self.last_sources
    }

    /// Lower-cased words of the question minus stopwords and short words
    pub fn extract_concepts(question: &str) -> Vec<String> {
        question
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                    .to_lowercase()
            })
            .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(&w.as_str()))
            .collect()
    }

    /// Drop the loaded paper and close its reading session
    pub fn clear_context(&mut self) -> ChatResult<()> {
        if let Some(session) = self.session_id.take() {
            self.storage.end_reading_session(&session)?;
        }
        self.current_paper = None;
        self.history.clear();
        self.last_sources.clear();
        Ok(())
    }

    fn end_session(&mut self) {
        if let Some(session) = self.session_id.take() {
            if let Err(e) = self.storage.end_reading_session(&session) {
                warn!("Failed to close reading session {}: {}", session, e);
            }
        }
    }

    fn remember(&mut self, question: &str, answer: &str) {
        self.history.push(ChatMessage::user(question));
        self.history.push(ChatMessage::assistant(answer));
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}
