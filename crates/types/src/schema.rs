// crates/types/src/schema.rs
use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One column of a table, as reported by the active-schema endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(rename = "isPrimaryKey", default)]
    pub is_primary_key: bool,
}

/// Table name → ordered columns for the currently active source.
///
/// Table order is whatever the backend sent; the first table is the one the
/// schema view expands by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct SchemaDescription {
    pub tables: IndexMap<String, Vec<ColumnDescriptor>>,
}

impl SchemaDescription {
    pub fn first_table(&self) -> Option<&str> {
        self.tables.keys().next().map(String::as_str)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Known table → row count. Partial maps are normal.
pub type SampleCounts = BTreeMap<String, u64>;

/// Convert the sample-data payload (`{"products_count": 50, ...}`) into a
/// table → count map. Keys without the `_count` suffix and non-integer values
/// are skipped.
pub fn sample_counts_from_wire(payload: &serde_json::Value) -> SampleCounts {
    let Some(obj) = payload.as_object() else {
        return SampleCounts::new();
    };
    obj.iter()
        .filter_map(|(key, value)| {
            let table = key.strip_suffix("_count")?;
            if table.is_empty() {
                return None;
            }
            Some((table.to_string(), value.as_u64()?))
        })
        .collect()
}

/// Schema state exposed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct SchemaView {
    pub schema: Option<SchemaDescription>,
    #[ts(type = "Record<string, number>")]
    pub sample_counts: SampleCounts,
    /// First table of the last successful fetch.
    pub default_expanded: Option<String>,
    pub expanded: BTreeSet<String>,
    pub loading: bool,
}

impl SchemaView {
    pub fn is_expanded(&self, table: &str) -> bool {
        self.expanded.contains(table)
    }

    /// Row count for `table` when the sample payload knows it.
    pub fn row_count_for(&self, table: &str) -> Option<u64> {
        self.sample_counts.get(table).copied()
    }
}
