//! Command implementations for the acm CLI

pub mod chat;
pub mod data;
pub mod deploy;
pub mod download;
pub mod library;
pub mod search;
pub mod serve;

pub use chat::run_chat;
pub use data::run_data;
pub use deploy::run_deploy;
pub use download::run_download;
pub use library::run_library;
pub use search::{run_interactive, run_last};
pub use serve::run_serve;
