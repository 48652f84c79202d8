// crates/core/src/history.rs
//! Best-effort history: recording never blocks or fails the main flow.

use std::sync::Arc;

use text2sql_types::{HistoryEntry, HistoryRecord};
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::error::RequestError;

/// Record `(question, sql)` on a detached task. The outcome is only logged.
///
/// The handle lets shutdown paths wait for the write; the session never does.
pub fn spawn_record(backend: Arc<dyn Backend>, question: String, sql: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let record = HistoryRecord { question, sql };
        match backend.record_history(&record).await {
            Ok(()) => tracing::debug!(question = %record.question, "History recorded"),
            Err(e) => {
                tracing::warn!(error = %e, operation = "record_history", "Failed to record history")
            }
        }
    })
}

/// Last fetched history list. Fetches run on the scheduler and land here
/// through [`apply`](Self::apply).
#[derive(Debug, Default)]
pub struct HistoryClient {
    entries: Vec<HistoryEntry>,
}

impl HistoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successfully fetched entries, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Apply a fetch. On failure the previous entries stay. Returns whether
    /// the list changed.
    pub fn apply(&mut self, result: Result<Vec<HistoryEntry>, RequestError>) -> bool {
        match result {
            Ok(entries) => {
                let changed = entries != self.entries;
                self.entries = entries;
                changed
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "fetch_history", "Keeping previous history");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use chrono::{TimeZone, Utc};

    fn entry(id: &str, question: &str) -> HistoryEntry {
        HistoryEntry {
            id: id.into(),
            question: question.into(),
            sql: None,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_failed_fetch_keeps_entries() {
        let mut history = HistoryClient::new();
        assert!(history.apply(Ok(vec![entry("a1", "Count products")])));
        assert!(!history.apply(Ok(vec![entry("a1", "Count products")])));

        let err = RequestError::backend(Operation::FetchHistory, 500, None);
        assert!(!history.apply(Err(err)));
        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.get(0).unwrap().question, "Count products");
        assert!(history.get(1).is_none());
    }
}
