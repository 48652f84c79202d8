// crates/types/src/events.rs
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{CatalogSnapshot, HistoryEntry, QuerySession, SchemaView, UploadOutcome};

/// Notifications the client core publishes for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    SessionChanged { session: QuerySession },
    CatalogChanged { catalog: CatalogSnapshot },
    SchemaChanged { schema: SchemaView },
    HistoryChanged { entries: Vec<HistoryEntry> },
    /// A delete is waiting for the user to confirm `prompt`.
    DeletePrompt { name: String, prompt: String },
    UploadCompleted { outcome: UploadOutcome },
    /// A surfaced failure outside the query session (switch, delete, upload).
    Error { operation: String, message: String },
}
