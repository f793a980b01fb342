use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Extract plain text from a PDF on a blocking thread
///
/// The parser can panic on malformed files; a panic is reported as an
/// ordinary extraction error.
pub async fn extract_text(path: &Path) -> Result<String> {
    if !path.exists() {
        anyhow::bail!("PDF not found: {}", path.display());
    }
    let owned = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| anyhow::anyhow!("PDF parser crashed on {}: {}", path.display(), e))?
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;

    let text = normalize_text(&text);
    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}

/// Collapse runs of spaces and blank lines left by PDF layout
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        let raw = "Title   Here\n\n\n\nFirst  line\nsecond\tline\n   \n";
        assert_eq!(normalize_text(raw), "Title Here\n\nFirst line\nsecond line");
        assert_eq!(normalize_text("  \n \n"), "");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = extract_text(Path::new("/nonexistent/paper.pdf")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landing.pdf");
        std::fs::write(&path, "<html>definitely not a pdf</html>").unwrap();
        assert!(extract_text(&path).await.is_err());
    }
}
