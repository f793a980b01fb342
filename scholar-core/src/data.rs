//! Usage data accumulated while reading papers
//!
//! Layout under `~/.acm-scholar/data/`:
//! - `qa_pairs.jsonl` (one [`QaPair`] per line)
//! - `reading_sessions.json` (id -> [`ReadingSession`])
//! - `knowledge.jsonl` (one [`KnowledgeEntry`] per line)

use crate::config::app_dir;
use crate::error::{Result, ScholarError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const QA_FILE: &str = "qa_pairs.jsonl";
const SESSIONS_FILE: &str = "reading_sessions.json";
const KNOWLEDGE_FILE: &str = "knowledge.jsonl";

/// Paper id recorded for library-wide questions
pub const GLOBAL_PAPER_ID: &str = "global";

const EXPORT_SYSTEM_PROMPT: &str =
    "You are a research assistant answering questions about scientific papers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Helpful,
    Unhelpful,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub id: String,
    pub paper_id: String,
    pub question: String,
    pub answer: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSession {
    pub id: String,
    pub paper_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<String>,
}

impl ReadingSession {
    /// Closed session length in seconds; open sessions count as zero
    pub fn duration_secs(&self) -> i64 {
        self.ended_at
            .map(|end| (end - self.started_at).num_seconds().max(0))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub paper_id: String,
    pub model: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QaStats {
    pub total_qa_pairs: usize,
    pub pairs_with_feedback: usize,
    pub unique_papers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeStats {
    pub total_papers: usize,
    pub models_used: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub total_questions: usize,
    pub total_reading_time_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataStats {
    pub qa_corpus: QaStats,
    pub knowledge_base: KnowledgeStats,
    pub reading_sessions: SessionStats,
    pub total_data_points: usize,
}

#[derive(Debug, Clone)]
pub struct DataStorage {
    dir: PathBuf,
}

impl DataStorage {
    /// Storage under `~/.acm-scholar/data`
    pub fn open_default() -> Self {
        Self::open(app_dir().join("data"))
    }

    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_qa_pair(
        &self,
        paper_id: &str,
        question: &str,
        answer: &str,
        model: &str,
    ) -> Result<QaPair> {
        let pair = QaPair {
            id: Uuid::new_v4().to_string(),
            paper_id: paper_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            model: model.to_string(),
            created_at: Utc::now(),
            feedback: None,
        };
        self.append_line(QA_FILE, &pair)?;
        Ok(pair)
    }

    pub fn qa_pairs(&self) -> Result<Vec<QaPair>> {
        self.read_lines(QA_FILE)
    }

    pub fn record_feedback(&self, qa_id: &str, feedback: Feedback) -> Result<()> {
        let mut pairs = self.qa_pairs()?;
        let pair = pairs
            .iter_mut()
            .find(|p| p.id == qa_id)
            .ok_or_else(|| ScholarError::UnknownQaPair {
                id: qa_id.to_string(),
            })?;
        pair.feedback = Some(feedback);
        self.write_lines(QA_FILE, &pairs)
    }

    pub fn start_reading_session(&self, paper_id: &str) -> Result<String> {
        let mut sessions = self.sessions()?;
        let session = ReadingSession {
            id: Uuid::new_v4().to_string(),
            paper_id: paper_id.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            questions: Vec::new(),
        };
        let id = session.id.clone();
        sessions.insert(id.clone(), session);
        self.write_sessions(&sessions)?;
        Ok(id)
    }

    pub fn add_question_to_session(&self, session_id: &str, question: &str) -> Result<()> {
        self.update_session(session_id, |s| s.questions.push(question.to_string()))
    }

    pub fn end_reading_session(&self, session_id: &str) -> Result<()> {
        self.update_session(session_id, |s| {
            s.ended_at.get_or_insert_with(Utc::now);
        })
    }

    pub fn sessions(&self) -> Result<BTreeMap<String, ReadingSession>> {
        let path = self.dir.join(SESSIONS_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| ScholarError::json(SESSIONS_FILE, e))
    }

    pub fn save_knowledge(&self, paper_id: &str, model: &str, summary: &str) -> Result<KnowledgeEntry> {
        let entry = KnowledgeEntry {
            paper_id: paper_id.to_string(),
            model: model.to_string(),
            summary: summary.to_string(),
            created_at: Utc::now(),
        };
        self.append_line(KNOWLEDGE_FILE, &entry)?;
        Ok(entry)
    }

    pub fn knowledge(&self) -> Result<Vec<KnowledgeEntry>> {
        self.read_lines(KNOWLEDGE_FILE)
    }

    pub fn stats(&self) -> Result<DataStats> {
        let pairs = self.qa_pairs()?;
        let qa_corpus = QaStats {
            total_qa_pairs: pairs.len(),
            pairs_with_feedback: pairs.iter().filter(|p| p.feedback.is_some()).count(),
            unique_papers: pairs
                .iter()
                .map(|p| p.paper_id.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
        };

        let knowledge = self.knowledge()?;
        let knowledge_base = KnowledgeStats {
            total_papers: knowledge
                .iter()
                .map(|k| k.paper_id.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            models_used: knowledge
                .iter()
                .map(|k| k.model.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let sessions = self.sessions()?;
        let total_secs: i64 = sessions.values().map(ReadingSession::duration_secs).sum();
        let reading_sessions = SessionStats {
            total_sessions: sessions.len(),
            total_questions: sessions.values().map(|s| s.questions.len()).sum(),
            total_reading_time_hours: (total_secs as f64 / 3600.0 * 100.0).round() / 100.0,
        };

        let total_data_points = qa_corpus.total_qa_pairs
            + knowledge_base.total_papers
            + reading_sessions.total_sessions;

        Ok(DataStats {
            qa_corpus,
            knowledge_base,
            reading_sessions,
            total_data_points,
        })
    }

    /// Export everything for fine-tuning or analysis
    ///
    /// QA pairs become chat-format training records; pairs marked unhelpful
    /// are left out. Returns `(name, path)` for each written file.
    pub fn export(&self, out_dir: &Path) -> Result<Vec<(&'static str, PathBuf)>> {
        fs::create_dir_all(out_dir)?;
        let mut written = Vec::new();

        let qa_path = out_dir.join(QA_FILE);
        let mut out = fs::File::create(&qa_path)?;
        for pair in self
            .qa_pairs()?
            .iter()
            .filter(|p| p.feedback != Some(Feedback::Unhelpful))
        {
            let record = json!({
                "messages": [
                    {"role": "system", "content": EXPORT_SYSTEM_PROMPT},
                    {"role": "user", "content": pair.question},
                    {"role": "assistant", "content": pair.answer},
                ],
                "paper_id": pair.paper_id,
                "model": pair.model,
            });
            writeln!(out, "{}", record)?;
        }
        written.push(("qa_pairs", qa_path));

        let sessions_path = out_dir.join(SESSIONS_FILE);
        let sessions: Vec<ReadingSession> = self.sessions()?.into_values().collect();
        let json = serde_json::to_string_pretty(&sessions)
            .map_err(|e| ScholarError::json(SESSIONS_FILE, e))?;
        fs::write(&sessions_path, json)?;
        written.push(("reading_sessions", sessions_path));

        let knowledge_path = out_dir.join(KNOWLEDGE_FILE);
        let mut out = fs::File::create(&knowledge_path)?;
        for entry in self.knowledge()? {
            let line =
                serde_json::to_string(&entry).map_err(|e| ScholarError::json(KNOWLEDGE_FILE, e))?;
            writeln!(out, "{}", line)?;
        }
        written.push(("knowledge", knowledge_path));

        Ok(written)
    }

    fn update_session<F>(&self, session_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ReadingSession),
    {
        let mut sessions = self.sessions()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ScholarError::UnknownSession {
                id: session_id.to_string(),
            })?;
        f(session);
        self.write_sessions(&sessions)
    }

    fn write_sessions(&self, sessions: &BTreeMap<String, ReadingSession>) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(sessions)
            .map_err(|e| ScholarError::json(SESSIONS_FILE, e))?;
        fs::write(self.dir.join(SESSIONS_FILE), json)?;
        Ok(())
    }

    fn append_line<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let line = serde_json::to_string(value).map_err(|e| ScholarError::json(file, e))?;
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        writeln!(out, "{}", line)?;
        Ok(())
    }

    fn read_lines<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&path)?);
        let mut items = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let item = serde_json::from_str(&line)
                .map_err(|e| ScholarError::json(format!("{}:{}", file, n + 1), e))?;
            items.push(item);
        }
        Ok(items)
    }

    fn write_lines<T: Serialize>(&self, file: &str, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut out = fs::File::create(self.dir.join(file))?;
        for item in items {
            let line = serde_json::to_string(item).map_err(|e| ScholarError::json(file, e))?;
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_qa_pairs_and_feedback() {
        let dir = TempDir::new().unwrap();
        let storage = DataStorage::open(dir.path());

        let first = storage
            .save_qa_pair("W1", "What is attention?", "A weighting scheme.", "gemini-1.5-pro")
            .unwrap();
        storage
            .save_qa_pair(GLOBAL_PAPER_ID, "Which papers cover RL?", "Two of them.", "gpt-4")
            .unwrap();

        storage.record_feedback(&first.id, Feedback::Helpful).unwrap();
        assert!(storage.record_feedback("missing", Feedback::Helpful).is_err());

        let stats = storage.stats().unwrap();
        assert_eq!(stats.qa_corpus.total_qa_pairs, 2);
        assert_eq!(stats.qa_corpus.pairs_with_feedback, 1);
        assert_eq!(stats.qa_corpus.unique_papers, 2);
    }

    #[test]
    fn test_reading_sessions() {
        let dir = TempDir::new().unwrap();
        let storage = DataStorage::open(dir.path());

        let id = storage.start_reading_session("W1").unwrap();
        storage.add_question_to_session(&id, "q1").unwrap();
        storage.add_question_to_session(&id, "q2").unwrap();
        storage.end_reading_session(&id).unwrap();

        let sessions = storage.sessions().unwrap();
        let session = &sessions[&id];
        assert_eq!(session.questions, vec!["q1", "q2"]);
        assert!(session.ended_at.is_some());

        assert!(matches!(
            storage.add_question_to_session("nope", "q"),
            Err(ScholarError::UnknownSession { .. })
        ));

        let stats = storage.stats().unwrap();
        assert_eq!(stats.reading_sessions.total_sessions, 1);
        assert_eq!(stats.reading_sessions.total_questions, 2);
    }

    #[test]
    fn test_knowledge_and_totals() {
        let dir = TempDir::new().unwrap();
        let storage = DataStorage::open(dir.path());

        storage.save_knowledge("W1", "gemini-1.5-pro", "Summary one").unwrap();
        storage.save_knowledge("W1", "gpt-4", "Summary two").unwrap();
        storage.save_knowledge("W2", "gpt-4", "Summary three").unwrap();
        storage.save_qa_pair("W1", "q", "a", "gpt-4").unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.knowledge_base.total_papers, 2);
        assert_eq!(stats.knowledge_base.models_used, vec!["gemini-1.5-pro", "gpt-4"]);
        assert_eq!(stats.total_data_points, 3);
    }

    #[test]
    fn test_export_skips_unhelpful() {
        let dir = TempDir::new().unwrap();
        let storage = DataStorage::open(dir.path().join("data"));

        let bad = storage.save_qa_pair("W1", "bad q", "bad a", "gpt-4").unwrap();
        storage.save_qa_pair("W1", "good q", "good a", "gpt-4").unwrap();
        storage.record_feedback(&bad.id, Feedback::Unhelpful).unwrap();
        storage.start_reading_session("W1").unwrap();

        let out = dir.path().join("exports");
        let written = storage.export(&out).unwrap();
        assert_eq!(written.len(), 3);

        let qa = fs::read_to_string(out.join(QA_FILE)).unwrap();
        let lines: Vec<_> = qa.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["messages"][1]["content"], "good q");
        assert_eq!(record["messages"][2]["role"], "assistant");

        let sessions: Vec<ReadingSession> =
            serde_json::from_str(&fs::read_to_string(out.join(SESSIONS_FILE)).unwrap()).unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_empty_storage() {
        let dir = TempDir::new().unwrap();
        let storage = DataStorage::open(dir.path().join("never-created"));
        let stats = storage.stats().unwrap();
        assert_eq!(stats, DataStats::default());
    }
}
