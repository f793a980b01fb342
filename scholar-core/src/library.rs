//! Local paper library
//!
//! The library is simply the set of `*.pdf` files in the download directory.

use crate::error::{Result, ScholarError};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibrarySort {
    /// Most recently modified first
    #[default]
    Date,
    /// Filename ascending
    Title,
    /// Largest first
    Size,
}

#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryStats {
    pub paper_count: usize,
    pub total_size: u64,
    pub location: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Library {
    dir: PathBuf,
}

impl Library {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// All PDFs, unsorted
    pub fn entries(&self) -> Result<Vec<LibraryEntry>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for item in fs::read_dir(&self.dir)? {
            let item = item?;
            let path = item.path();
            let is_pdf = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if !is_pdf || !path.is_file() {
                continue;
            }
            let meta = item.metadata()?;
            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.push(LibraryEntry {
                name: item.file_name().to_string_lossy().into_owned(),
                path,
                size: meta.len(),
                modified,
            });
        }
        Ok(entries)
    }

    pub fn list(&self, sort: LibrarySort, limit: Option<usize>) -> Result<Vec<LibraryEntry>> {
        let mut entries = self.entries()?;
        match sort {
            LibrarySort::Date => entries.sort_by(|a, b| b.modified.cmp(&a.modified)),
            LibrarySort::Title => entries.sort_by(|a, b| a.name.cmp(&b.name)),
            LibrarySort::Size => entries.sort_by(|a, b| b.size.cmp(&a.size)),
        }
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    pub fn stats(&self) -> Result<LibraryStats> {
        let entries = self.entries()?;
        Ok(LibraryStats {
            paper_count: entries.len(),
            total_size: entries.iter().map(|e| e.size).sum(),
            location: self.dir.clone(),
        })
    }

    /// Resolve a 1-based index (title order) or an exact filename
    pub fn resolve(&self, reference: &str) -> Result<LibraryEntry> {
        let reference = reference.trim();
        let entries = self.list(LibrarySort::Title, None)?;

        if let Ok(index) = reference.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| entries.get(i).cloned())
                .ok_or_else(|| ScholarError::unknown_paper(reference));
        }

        entries
            .into_iter()
            .find(|e| e.name == reference)
            .ok_or_else(|| ScholarError::unknown_paper(reference))
    }

    pub fn remove(&self, reference: &str) -> Result<LibraryEntry> {
        let entry = self.resolve(reference)?;
        fs::remove_file(&entry.path)?;
        debug!("Removed {}", entry.path.display());
        Ok(entry)
    }

    /// Delete PDFs last modified more than `days` ago
    ///
    /// A cutoff before the representable range removes nothing.
    pub fn clean_older_than(&self, days: u32) -> Result<usize> {
        let Some(cutoff) = Utc::now().checked_sub_signed(Duration::days(i64::from(days))) else {
            return Ok(0);
        };
        let stale: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|e| e.modified < cutoff)
            .collect();
        Ok(self.delete_all(&stale))
    }

    pub fn clean_all(&self) -> Result<usize> {
        let entries = self.entries()?;
        Ok(self.delete_all(&entries))
    }

    fn delete_all(&self, entries: &[LibraryEntry]) -> usize {
        entries
            .iter()
            .filter(|e| match fs::remove_file(&e.path) {
                Ok(()) => true,
                Err(err) => {
                    warn!("Failed to delete {}: {}", e.name, err);
                    false
                }
            })
            .count()
    }

    /// Case-insensitive filename match, title order
    pub fn search(&self, keyword: &str) -> Result<Vec<LibraryEntry>> {
        let needle = keyword.to_lowercase();
        Ok(self
            .list(LibrarySort::Title, None)?
            .into_iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .collect())
    }
}

/// Human-readable size with one decimal: `512.0 B`, `1.5 MB`
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}
