//! Last search results, persisted between invocations
//!
//! `acm last`, `acm interactive` and `acm download from-search` all read the
//! most recent `acm search` output from `~/.acm-scholar/last_search.json`.

use crate::config::app_dir;
use crate::error::{Result, ScholarError};
use crate::work::Work;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHistory {
    pub query: String,
    pub searched_at: DateTime<Utc>,
    pub results: Vec<Work>,
}

impl SearchHistory {
    pub fn new(query: impl Into<String>, results: Vec<Work>) -> Self {
        Self {
            query: query.into(),
            searched_at: Utc::now(),
            results,
        }
    }

    pub fn default_path() -> PathBuf {
        app_dir().join("last_search.json")
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::default_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ScholarError::json("serializing last search", e))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Last search, or `None` when nothing has been searched yet
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let history = serde_json::from_str(&content)
            .map_err(|e| ScholarError::json(path.display().to_string(), e))?;
        Ok(Some(history))
    }

    /// Pick results by a comma-separated list of 1-based indices
    ///
    /// Invalid or out-of-range entries are skipped; duplicates are kept once.
    pub fn select(&self, indices: &str) -> Vec<&Work> {
        let mut picked: Vec<usize> = Vec::new();
        for part in indices.split(',') {
            let Ok(n) = part.trim().parse::<usize>() else {
                continue;
            };
            if n >= 1 && n <= self.results.len() && !picked.contains(&n) {
                picked.push(n);
            }
        }
        picked.into_iter().map(|n| &self.results[n - 1]).collect()
    }
}
