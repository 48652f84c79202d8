// crates/types/src/source.rs
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Name of the built-in source every backend starts with.
pub const DEFAULT_SOURCE: &str = "default";

/// Label shown when the active source is not (yet) in the local catalog.
pub const DEFAULT_SOURCE_LABEL: &str = "Default (E-commerce)";

/// Where a data source came from.
///
/// The backend reports the built-in source as `"default"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub enum SourceOrigin {
    #[serde(rename = "default", alias = "built-in")]
    BuiltIn,
    #[serde(rename = "uploaded")]
    Uploaded,
}

/// One entry of the data-source catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct DataSource {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub origin: SourceOrigin,
    #[serde(default)]
    pub active: bool,
    /// Present only for uploaded sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub column_count: Option<u64>,
}

impl DataSource {
    /// The built-in source, as the backend describes it.
    pub fn built_in() -> Self {
        Self {
            name: DEFAULT_SOURCE.to_string(),
            display_name: DEFAULT_SOURCE_LABEL.to_string(),
            origin: SourceOrigin::BuiltIn,
            active: false,
            row_count: None,
            column_count: None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.origin == SourceOrigin::Uploaded
    }

    /// Human label used in confirmation prompts: underscores become spaces.
    pub fn prompt_label(&self) -> String {
        self.name.replace('_', " ")
    }
}

/// Response of the list-sources endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct SourceListing {
    pub databases: Vec<DataSource>,
    pub active: String,
}

/// What the presentation layer sees of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub sources: Vec<DataSource>,
    pub active: String,
    pub active_label: String,
}
