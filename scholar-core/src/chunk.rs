use crate::error::{Result, ScholarError};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split text into overlapping character windows
///
/// Windows advance by `size - overlap` characters and the last window ends at
/// the end of the text. Whitespace-only text yields no chunks.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    if size == 0 || overlap >= size {
        return Err(ScholarError::InvalidChunking { size, overlap });
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// `chunk_text` with the default window (1000 chars, 200 overlap)
pub fn chunk_default(text: &str) -> Vec<String> {
    chunk_text(text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_overlap() {
        let text: String = ('a'..='z').collect();
        let chunks = chunk_text(&text, 10, 4).unwrap();

        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "ghijklmnop");
        assert!(chunks.last().unwrap().ends_with('z'));
        for pair in chunks.windows(2) {
            assert_eq!(&pair[0][6..], &pair[1][..4]);
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_default("a short abstract");
        assert_eq!(chunks, vec!["a short abstract".to_string()]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
        assert!(chunk_text("   \n", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text, 10, 5).unwrap();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        assert!(matches!(
            chunk_text("abc", 5, 5),
            Err(ScholarError::InvalidChunking { size: 5, overlap: 5 })
        ));
        assert!(chunk_text("abc", 0, 0).is_err());
    }
}
