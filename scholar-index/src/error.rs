use thiserror::Error;

/// Errors raised by paper stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach or authenticate against the database
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: surrealdb::Error,
    },

    #[error("Timed out connecting to {url}")]
    ConnectTimeout { url: String },

    /// Query failed after connecting
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),

    /// Stored row could not be interpreted
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StoreError::InvalidRecord("chunk without paper_id".into());
        assert_eq!(err.to_string(), "Invalid record: chunk without paper_id");
    }
}
