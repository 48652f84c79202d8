// crates/core/src/backend/mod.rs
//! The HTTP-shaped boundary to the text2sql backend.
//!
//! Everything above this module talks to [`Backend`] only, so the state
//! machines can be driven by an in-process stub in tests.

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use text2sql_types::{
    Ack, ExecutionResult, GeneratedQuery, HealthStatus, HistoryEntry, HistoryRecord, SampleCounts,
    SchemaDescription, SourceListing, UploadOutcome,
};

use crate::config::ClientConfig;
use crate::error::{ClientResult, RequestError};

pub use http::HttpBackend;

/// Operations the backend exposes. Every call is independent and stateless
/// on the client side; the backend owns the active-source pointer.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Turn a natural-language question into a query plus explanation.
    async fn generate_query(&self, question: &str) -> Result<GeneratedQuery, RequestError>;

    /// Run a query against the active source.
    async fn execute_query(&self, sql: &str) -> Result<ExecutionResult, RequestError>;

    /// Persist a (question, query) pair.
    async fn record_history(&self, record: &HistoryRecord) -> Result<(), RequestError>;

    /// Newest-first history, capped by the backend.
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, RequestError>;

    async fn list_sources(&self) -> Result<SourceListing, RequestError>;

    async fn switch_source(&self, name: &str) -> Result<Ack, RequestError>;

    async fn delete_source(&self, name: &str) -> Result<Ack, RequestError>;

    /// Ingest a file as a new source. The backend makes it active.
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>)
        -> Result<UploadOutcome, RequestError>;

    async fn active_schema(&self) -> Result<SchemaDescription, RequestError>;

    /// Row counts for the built-in tables. Best effort.
    async fn sample_counts(&self) -> Result<SampleCounts, RequestError>;

    async fn health(&self) -> Result<HealthStatus, RequestError>;

    /// Backend name for logging (e.g. "http").
    fn name(&self) -> &str;
}

/// Build the backend described by `config`.
pub fn create_backend(config: &ClientConfig) -> ClientResult<Arc<dyn Backend>> {
    Ok(Arc::new(HttpBackend::new(config)?))
}
