// crates/types/src/query.rs
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::Scalar;

/// Body of the generate-query call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub question: String,
}

/// A query produced from a natural-language question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct GeneratedQuery {
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
}

/// Body of the execute-query call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub sql: String,
}

/// Result of running a query.
///
/// `row_count` is kept exactly as the backend reported it and is not derived
/// from `rows.len()`; the two may differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    #[ts(type = "Array<Array<unknown>>")]
    pub rows: Vec<Vec<Scalar>>,
    #[ts(type = "number")]
    pub row_count: u64,
}

impl ExecutionResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
