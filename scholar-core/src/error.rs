/// Structured error types for scholar-core.
///
/// Library consumers get composable errors; the `acm` binary wraps them in
/// `anyhow` with command-level context.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scholar-core operations
#[derive(Error, Debug)]
pub enum ScholarError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// File or directory not found
    #[error("Path not found: {path:?}")]
    PathNotFound { path: PathBuf },

    /// Paper reference did not resolve to a library entry
    #[error("No paper matches '{reference}' in the library")]
    UnknownPaper { reference: String },

    /// Reading session id is unknown
    #[error("Unknown reading session: {id}")]
    UnknownSession { id: String },

    /// QA pair id is unknown
    #[error("Unknown QA pair: {id}")]
    UnknownQaPair { id: String },

    /// Chunking parameters are inconsistent
    #[error("Invalid chunking parameters: size={size}, overlap={overlap}")]
    InvalidChunking { size: usize, overlap: usize },

    /// Endpoint URL could not be interpreted
    #[error("Invalid endpoint '{value}': {reason}")]
    InvalidEndpoint { value: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for scholar-core operations
pub type Result<T> = std::result::Result<T, ScholarError>;

impl ScholarError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    pub fn unknown_paper(reference: impl Into<String>) -> Self {
        Self::UnknownPaper {
            reference: reference.into(),
        }
    }

    pub fn invalid_endpoint(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScholarError::unknown_paper("7");
        assert_eq!(err.to_string(), "No paper matches '7' in the library");

        let err = ScholarError::InvalidChunking {
            size: 100,
            overlap: 100,
        };
        assert!(err.to_string().contains("overlap=100"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ScholarError = io_err.into();

        assert!(matches!(err, ScholarError::Io { .. }));
    }
}
