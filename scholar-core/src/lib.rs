pub mod chunk;
pub mod config;
pub mod data;
pub mod deploy;
pub mod error;
pub mod history;
pub mod library;
pub mod work;

pub use chunk::{chunk_default, chunk_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use config::{load_dotenv, DatabaseConfig, LlmConfig, LlmProvider, ScholarConfig};
pub use data::{DataStats, DataStorage, Feedback, KnowledgeEntry, QaPair, ReadingSession, GLOBAL_PAPER_ID};
pub use error::{Result, ScholarError};
pub use history::SearchHistory;
pub use library::{format_size, Library, LibraryEntry, LibrarySort, LibraryStats};
pub use work::Work;
