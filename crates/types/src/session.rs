// crates/types/src/session.rs
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ExecutionResult;

/// Lifecycle phase of the live query session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Generating,
    Generated,
    GenerationFailed,
    Executing,
    Executed,
    ExecutionFailed,
}

impl Phase {
    /// A network call for this session is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Generating | Phase::Executing)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Phase::GenerationFailed | Phase::ExecutionFailed)
    }
}

/// State of one question's lifecycle, as the presentation layer sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct QuerySession {
    pub question: String,
    pub sql: Option<String>,
    pub explanation: Option<String>,
    pub result: Option<ExecutionResult>,
    pub phase: Phase,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_flags() {
        assert!(Phase::Generating.is_in_flight());
        assert!(Phase::Executing.is_in_flight());
        assert!(!Phase::Generated.is_in_flight());
        assert!(Phase::ExecutionFailed.is_failed());
        assert!(!Phase::Idle.is_failed());
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = QuerySession {
            question: "q".into(),
            phase: Phase::GenerationFailed,
            error: Some("boom".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["phase"], "generation_failed");
        assert_eq!(json["error"], "boom");
        assert!(json["sql"].is_null());
    }
}
