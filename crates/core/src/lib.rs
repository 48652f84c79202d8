// crates/core/src/lib.rs
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod refresh;
pub mod scheduler;
pub mod schema;
pub mod session;
pub mod upload;

pub use backend::{create_backend, Backend, HttpBackend};
pub use catalog::{CatalogStore, ListingOutcome, PendingDeletion};
pub use config::ClientConfig;
pub use error::*;
pub use history::HistoryClient;
pub use refresh::RefreshSignal;
pub use scheduler::{AppEvent, Orchestrator};
pub use schema::SchemaClient;
pub use session::{QuerySessionController, EXAMPLE_QUESTIONS};
pub use upload::{UploadCandidate, UploadWorkflow};
