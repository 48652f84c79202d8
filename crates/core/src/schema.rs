// crates/core/src/schema.rs
//! Table/column metadata for the active source, plus the view state the
//! presentation layer needs (default-expanded table, expand toggles).

use std::collections::BTreeSet;

use text2sql_types::{SampleCounts, SchemaDescription, SchemaView};

use crate::backend::Backend;
use crate::error::RequestError;

/// Results of one schema fetch. The two halves are independent.
#[derive(Debug)]
pub struct SchemaFetch {
    pub schema: Result<SchemaDescription, RequestError>,
    pub counts: Result<SampleCounts, RequestError>,
}

/// Issue the schema and sample-count calls concurrently. Neither failure
/// affects the other.
pub async fn fetch_schema(backend: &dyn Backend) -> SchemaFetch {
    let (schema, counts) = tokio::join!(backend.active_schema(), backend.sample_counts());
    SchemaFetch { schema, counts }
}

/// Holds the schema view. Fetches run elsewhere and come back through
/// [`apply`](Self::apply) tagged with the generation they were started under.
#[derive(Debug, Default)]
pub struct SchemaClient {
    view: SchemaView,
    generation: u64,
    fetches: u64,
}

impl SchemaClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &SchemaView {
        &self.view
    }

    pub fn schema(&self) -> Option<&SchemaDescription> {
        self.view.schema.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.view.loading
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    /// Start a fetch. Returns the generation its results must be applied
    /// under; any earlier generation still in flight becomes stale.
    pub fn begin_fetch(&mut self) -> u64 {
        self.generation += 1;
        self.fetches += 1;
        self.view.loading = true;
        tracing::debug!(generation = self.generation, "Fetching active schema");
        self.generation
    }

    /// Apply the results of the fetch started as `generation`.
    ///
    /// Returns false when the fetch was superseded and nothing changed.
    pub fn apply(&mut self, generation: u64, fetch: SchemaFetch) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "Dropping stale schema fetch");
            return false;
        }
        self.view.loading = false;

        match fetch.schema {
            Ok(schema) => {
                let first = schema.first_table().map(str::to_string);
                self.view.expanded = first.iter().cloned().collect::<BTreeSet<_>>();
                self.view.default_expanded = first;
                self.view.schema = Some(schema);
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "active_schema", "Keeping previous schema");
            }
        }

        self.view.sample_counts = match fetch.counts {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!(error = %e, operation = "sample_counts", "Sample counts unavailable");
                SampleCounts::new()
            }
        };
        true
    }

    /// Flip a table between expanded and collapsed. Unknown tables are ignored.
    pub fn toggle(&mut self, table: &str) -> bool {
        let known = self
            .view
            .schema
            .as_ref()
            .is_some_and(|s| s.tables.contains_key(table));
        if !known {
            return false;
        }
        if !self.view.expanded.remove(table) {
            self.view.expanded.insert(table.to_string());
        }
        true
    }
}
