// crates/types/src/upload.rs
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{ColumnDescriptor, DataSource, SchemaDescription, Scalar, SourceOrigin};

/// One preview row: column name → value, in column order.
pub type PreviewRow = IndexMap<String, Scalar>;

/// Successful upload response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct UploadOutcome {
    pub table_name: String,
    pub display_name: String,
    #[ts(type = "number")]
    pub row_count: u64,
    #[ts(type = "number")]
    pub column_count: u64,
    #[serde(default)]
    #[ts(type = "Array<Record<string, unknown>>")]
    pub preview: Vec<PreviewRow>,
    /// Column name → inferred type for the new table.
    #[serde(default)]
    pub schema: IndexMap<String, String>,
}

impl UploadOutcome {
    /// Catalog entry for the uploaded table, marked active.
    pub fn data_source(&self) -> DataSource {
        DataSource {
            name: self.table_name.clone(),
            display_name: self.display_name.clone(),
            origin: SourceOrigin::Uploaded,
            active: true,
            row_count: Some(self.row_count),
            column_count: Some(self.column_count),
        }
    }

    /// The inferred schema as a one-table [`SchemaDescription`].
    pub fn schema_description(&self) -> SchemaDescription {
        let columns = self
            .schema
            .iter()
            .map(|(name, data_type)| ColumnDescriptor {
                name: name.clone(),
                data_type: data_type.clone(),
                is_primary_key: false,
            })
            .collect();
        let mut tables = IndexMap::new();
        tables.insert(self.table_name.clone(), columns);
        SchemaDescription { tables }
    }
}
