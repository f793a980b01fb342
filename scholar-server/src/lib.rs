//! scholar-server: the acm backend service
//!
//! Exposes OpenAlex search, paper lookup, store statistics and question
//! answering over HTTP for the web frontend. Every address and credential
//! comes from the environment (see `acm deploy env backend`).

pub mod error;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, cors_layer, run_server};
pub use settings::ServeConfig;
pub use state::AppState;
