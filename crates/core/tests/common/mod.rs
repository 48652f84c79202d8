// Shared in-memory backend for the integration tests.
//
// Every call is counted on entry (before any gate), so "exactly one call"
// assertions count issued requests, not completed ones.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use text2sql_core::backend::Backend;
use text2sql_core::config::ClientConfig;
use text2sql_core::error::{Operation, RequestError};
use text2sql_core::Orchestrator;
use text2sql_types::{
    Ack, ColumnDescriptor, DataSource, ExecutionResult, GeneratedQuery, HealthStatus,
    HistoryEntry, HistoryRecord, SampleCounts, SchemaDescription, SourceListing, SourceOrigin,
    UploadOutcome, DEFAULT_SOURCE,
};
use tokio::sync::Notify;

struct StubState {
    sources: Vec<DataSource>,
    active: String,
    schemas: HashMap<String, SchemaDescription>,
    generated: GeneratedQuery,
    execution: ExecutionResult,
    history: Vec<HistoryEntry>,
    failures: HashMap<Operation, (u16, Option<String>)>,
    calls: HashMap<Operation, usize>,
    recorded: Vec<HistoryRecord>,
    uploads: Vec<(String, usize)>,
    switches: Vec<String>,
}

pub struct StubBackend {
    state: Mutex<StubState>,
    gates: Mutex<HashMap<Operation, Arc<Notify>>>,
}

pub fn columns(names: &[&str]) -> Vec<ColumnDescriptor> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnDescriptor {
            name: name.to_string(),
            data_type: if i == 0 { "INTEGER" } else { "TEXT" }.to_string(),
            is_primary_key: i == 0,
        })
        .collect()
}

fn default_schema() -> SchemaDescription {
    let mut tables = IndexMap::new();
    tables.insert("products".to_string(), columns(&["id", "name", "category", "price"]));
    tables.insert("customers".to_string(), columns(&["id", "name", "city"]));
    tables.insert("orders".to_string(), columns(&["id", "customer_id", "total"]));
    SchemaDescription { tables }
}

fn single_table_schema(table: &str) -> SchemaDescription {
    let mut tables = IndexMap::new();
    tables.insert(table.to_string(), columns(&["id", "region", "amount"]));
    SchemaDescription { tables }
}

pub fn uploaded_source(name: &str) -> DataSource {
    DataSource {
        name: name.to_string(),
        display_name: name.replace('_', " "),
        origin: SourceOrigin::Uploaded,
        active: false,
        row_count: Some(120),
        column_count: Some(3),
    }
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        let mut schemas = HashMap::new();
        schemas.insert(DEFAULT_SOURCE.to_string(), default_schema());
        Arc::new(Self {
            state: Mutex::new(StubState {
                sources: vec![DataSource::built_in()],
                active: DEFAULT_SOURCE.to_string(),
                schemas,
                generated: GeneratedQuery {
                    sql: "SELECT * FROM products ORDER BY price DESC LIMIT 5".into(),
                    explanation: "Sorts products by price and keeps the first five.".into(),
                },
                execution: ExecutionResult {
                    columns: vec!["id".into(), "name".into(), "price".into()],
                    rows: vec![vec![
                        serde_json::json!(1),
                        serde_json::json!("A"),
                        serde_json::json!(9.99),
                    ]],
                    row_count: 1,
                },
                history: Vec::new(),
                failures: HashMap::new(),
                calls: HashMap::new(),
                recorded: Vec::new(),
                uploads: Vec::new(),
                switches: Vec::new(),
            }),
            gates: Mutex::new(HashMap::new()),
        })
    }

    /// Stub with an extra uploaded source and its one-table schema.
    pub fn with_uploaded(name: &str) -> Arc<Self> {
        let stub = Self::new();
        {
            let mut state = stub.state.lock().unwrap();
            state.sources.push(uploaded_source(name));
            state.schemas.insert(name.to_string(), single_table_schema(name));
        }
        stub
    }

    pub fn set_generated(&self, sql: &str, explanation: &str) {
        self.state.lock().unwrap().generated = GeneratedQuery {
            sql: sql.into(),
            explanation: explanation.into(),
        };
    }

    pub fn set_execution(&self, result: ExecutionResult) {
        self.state.lock().unwrap().execution = result;
    }

    pub fn set_history(&self, entries: Vec<HistoryEntry>) {
        self.state.lock().unwrap().history = entries;
    }

    /// Change the active source behind the client's back.
    pub fn set_active(&self, name: &str) {
        self.state.lock().unwrap().active = name.to_string();
    }

    pub fn active(&self) -> String {
        self.state.lock().unwrap().active.clone()
    }

    /// Make every call of `operation` fail with `status` and `detail`.
    pub fn fail(&self, operation: Operation, status: u16, detail: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, (status, detail.map(str::to_string)));
    }

    pub fn succeed(&self, operation: Operation) {
        self.state.lock().unwrap().failures.remove(&operation);
    }

    /// Hold calls of `operation` until the returned gate is notified.
    pub fn hold(&self, operation: Operation) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(operation, Arc::clone(&gate));
        gate
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn recorded(&self) -> Vec<HistoryRecord> {
        self.state.lock().unwrap().recorded.clone()
    }

    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn switches(&self) -> Vec<String> {
        self.state.lock().unwrap().switches.clone()
    }

    /// Count the call, wait at its gate if held, then report any scripted
    /// failure.
    async fn enter(&self, operation: Operation) -> Result<(), RequestError> {
        *self
            .state
            .lock()
            .unwrap()
            .calls
            .entry(operation)
            .or_insert(0) += 1;

        let gate = self.gates.lock().unwrap().get(&operation).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failure = self.state.lock().unwrap().failures.get(&operation).cloned();
        match failure {
            Some((status, detail)) => Err(RequestError::backend(operation, status, detail)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn generate_query(&self, _question: &str) -> Result<GeneratedQuery, RequestError> {
        self.enter(Operation::GenerateQuery).await?;
        Ok(self.state.lock().unwrap().generated.clone())
    }

    async fn execute_query(&self, _sql: &str) -> Result<ExecutionResult, RequestError> {
        self.enter(Operation::ExecuteQuery).await?;
        Ok(self.state.lock().unwrap().execution.clone())
    }

    async fn record_history(&self, record: &HistoryRecord) -> Result<(), RequestError> {
        self.enter(Operation::RecordHistory).await?;
        self.state.lock().unwrap().recorded.push(record.clone());
        Ok(())
    }

    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, RequestError> {
        self.enter(Operation::FetchHistory).await?;
        Ok(self.state.lock().unwrap().history.clone())
    }

    async fn list_sources(&self) -> Result<SourceListing, RequestError> {
        self.enter(Operation::ListSources).await?;
        let state = self.state.lock().unwrap();
        let databases = state
            .sources
            .iter()
            .cloned()
            .map(|mut s| {
                s.active = s.name == state.active;
                s
            })
            .collect();
        Ok(SourceListing {
            databases,
            active: state.active.clone(),
        })
    }

    async fn switch_source(&self, name: &str) -> Result<Ack, RequestError> {
        self.enter(Operation::SwitchSource).await?;
        let mut state = self.state.lock().unwrap();
        if !state.sources.iter().any(|s| s.name == name) {
            return Err(RequestError::backend(
                Operation::SwitchSource,
                404,
                Some("Database not found".into()),
            ));
        }
        state.active = name.to_string();
        state.switches.push(name.to_string());
        Ok(Ack {
            success: true,
            message: Some(format!("Switched to {name}")),
        })
    }

    async fn delete_source(&self, name: &str) -> Result<Ack, RequestError> {
        self.enter(Operation::DeleteSource).await?;
        let mut state = self.state.lock().unwrap();
        let before = state.sources.len();
        state
            .sources
            .retain(|s| !(s.name == name && s.origin == SourceOrigin::Uploaded));
        if state.sources.len() == before {
            return Err(RequestError::backend(
                Operation::DeleteSource,
                404,
                Some("Table not found".into()),
            ));
        }
        state.schemas.remove(name);
        if state.active == name {
            state.active = DEFAULT_SOURCE.to_string();
        }
        Ok(Ack {
            success: true,
            message: None,
        })
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadOutcome, RequestError> {
        self.enter(Operation::UploadFile).await?;
        let table = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name)
            .to_lowercase()
            .replace(&[' ', '-'][..], "_");
        let mut state = self.state.lock().unwrap();
        state.uploads.push((file_name.to_string(), bytes.len()));
        state.sources.retain(|s| s.name != table);
        state.sources.push(uploaded_source(&table));
        state.schemas.insert(table.clone(), single_table_schema(&table));
        state.active = table.clone();

        let mut schema = IndexMap::new();
        schema.insert("id".to_string(), "INTEGER".to_string());
        schema.insert("region".to_string(), "TEXT".to_string());
        schema.insert("amount".to_string(), "REAL".to_string());
        let mut row = IndexMap::new();
        row.insert("id".to_string(), serde_json::json!(1));
        row.insert("region".to_string(), serde_json::json!("EU"));
        row.insert("amount".to_string(), serde_json::json!(10.5));
        Ok(UploadOutcome {
            display_name: table.replace('_', " "),
            table_name: table,
            row_count: 120,
            column_count: 3,
            preview: vec![row],
            schema,
        })
    }

    async fn active_schema(&self) -> Result<SchemaDescription, RequestError> {
        self.enter(Operation::ActiveSchema).await?;
        let state = self.state.lock().unwrap();
        Ok(state.schemas.get(&state.active).cloned().unwrap_or_default())
    }

    async fn sample_counts(&self) -> Result<SampleCounts, RequestError> {
        self.enter(Operation::SampleCounts).await?;
        Ok([
            ("products".to_string(), 50),
            ("customers".to_string(), 20),
            ("orders".to_string(), 100),
        ]
        .into_iter()
        .collect())
    }

    async fn health(&self) -> Result<HealthStatus, RequestError> {
        self.enter(Operation::Health).await?;
        Ok(HealthStatus {
            status: "healthy".into(),
            service: "text2sql".into(),
            database: "connected".into(),
        })
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Config for tests: polling far enough out that it never fires on its own.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        poll_interval: Duration::from_secs(3600),
        ..ClientConfig::default()
    }
}

/// Orchestrator over `stub`, activated and settled.
pub async fn activated(stub: &Arc<StubBackend>) -> Orchestrator {
    let backend: Arc<dyn Backend> = stub.clone();
    let mut orchestrator = Orchestrator::new(backend, &test_config());
    orchestrator.activate();
    orchestrator.settle().await;
    orchestrator
}

/// Let spawned tasks run until `done` holds, or panic after a while.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
