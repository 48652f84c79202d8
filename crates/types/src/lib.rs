// crates/types/src/lib.rs
//! Wire and view models shared between the text2sql client core and the
//! presentation layer.
//!
//! Every type here mirrors a JSON shape either returned by the backend or
//! published to the UI. TypeScript bindings are generated with the `codegen`
//! feature.

pub mod events;
pub mod health;
pub mod history;
pub mod query;
pub mod schema;
pub mod session;
pub mod source;
pub mod upload;

pub use events::*;
pub use health::*;
pub use history::*;
pub use query::*;
pub use schema::*;
pub use session::*;
pub use source::*;
pub use upload::*;

/// A single cell value in a result row or upload preview. `null` is allowed.
pub type Scalar = serde_json::Value;

/// Opaque acknowledgement returned by mutating endpoints.
///
/// The backend answers `{"success": true, ...}`; the remaining fields are
/// endpoint-specific and not relied on.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
