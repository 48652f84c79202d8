// crates/core/src/scheduler.rs
//! Single-task event loop tying the components together.
//!
//! The [`Orchestrator`] owns every component and is the only place their
//! state is mutated. User events arrive on an mpsc channel and the catalog
//! is polled on a timer. No network call is awaited on the loop itself:
//! each one runs on its own task and comes back on an internal channel,
//! tagged with the request it answers. Every change is published as a
//! [`ClientEvent`] on a broadcast channel.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use text2sql_types::{Ack, ClientEvent, HistoryEntry, SourceListing, UploadOutcome};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::backend::Backend;
use crate::catalog::{CatalogStore, ListingOutcome, ListingTicket, PendingDeletion};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, Operation, RequestError, ValidationError};
use crate::history::HistoryClient;
use crate::refresh::RefreshSignal;
use crate::schema::{fetch_schema, SchemaClient, SchemaFetch};
use crate::session::{QuerySessionController, SessionInput, EXAMPLE_QUESTIONS};
use crate::upload::{file_name_of, UploadCandidate, UploadWorkflow};

/// Something the user did.
#[derive(Debug, Clone)]
pub enum AppEvent {
    EditQuestion(String),
    /// Index into [`EXAMPLE_QUESTIONS`].
    SelectExample(usize),
    /// Index into the last fetched history list.
    LoadHistoryEntry(usize),
    /// Generate for the current question.
    SubmitQuestion,
    /// Set the question and generate.
    Ask(String),
    ExecuteQuery(String),
    /// Execute the query currently held by the session.
    ExecuteGenerated,
    SwitchSource(String),
    /// Ask for confirmation to delete a source.
    RequestDelete(String),
    /// Confirm the pending delete of this source.
    ConfirmDelete(String),
    CancelDelete,
    Upload(UploadCandidate),
    UploadPath(PathBuf),
    ToggleTable(String),
    RefreshCatalog,
    RefreshHistory,
    Shutdown,
}

impl AppEvent {
    fn label(&self) -> &'static str {
        match self {
            AppEvent::EditQuestion(_) | AppEvent::SelectExample(_) => "edit_question",
            AppEvent::LoadHistoryEntry(_) => "load_history",
            AppEvent::SubmitQuestion | AppEvent::Ask(_) => "generate_query",
            AppEvent::ExecuteQuery(_) | AppEvent::ExecuteGenerated => "execute_query",
            AppEvent::SwitchSource(_) => "switch_source",
            AppEvent::RequestDelete(_) | AppEvent::ConfirmDelete(_) | AppEvent::CancelDelete => {
                "delete_source"
            }
            AppEvent::Upload(_) | AppEvent::UploadPath(_) => "upload_file",
            AppEvent::ToggleTable(_) => "toggle_table",
            AppEvent::RefreshCatalog => "list_sources",
            AppEvent::RefreshHistory => "fetch_history",
            AppEvent::Shutdown => "shutdown",
        }
    }
}

/// Identifies one catalog, upload or history call.
type CallId = u64;

/// Network results for components other than the session.
#[derive(Debug)]
enum Completion {
    Schema {
        generation: u64,
        fetch: SchemaFetch,
    },
    Listing {
        ticket: ListingTicket,
        result: Result<SourceListing, RequestError>,
    },
    Switch {
        call: CallId,
        name: String,
        result: Result<Ack, RequestError>,
    },
    Delete {
        call: CallId,
        name: String,
        result: Result<Ack, RequestError>,
    },
    Upload {
        call: CallId,
        result: ClientResult<UploadOutcome>,
    },
    History {
        call: CallId,
        result: Result<Vec<HistoryEntry>, RequestError>,
    },
}

/// Outstanding calls. At most one per kind; listings may overlap and are
/// ordered by their tickets instead.
#[derive(Debug, Default)]
struct InFlight {
    next_call: CallId,
    switch: Option<CallId>,
    delete: Option<CallId>,
    upload: Option<CallId>,
    history: Option<CallId>,
    listings: usize,
}

impl InFlight {
    fn next(&mut self) -> CallId {
        self.next_call += 1;
        self.next_call
    }

    fn any(&self) -> bool {
        self.switch.is_some()
            || self.delete.is_some()
            || self.upload.is_some()
            || self.history.is_some()
            || self.listings > 0
    }
}

/// Clear `slot` if it holds `call`. False for a result nobody waits for.
fn finish(slot: &mut Option<CallId>, call: CallId) -> bool {
    if *slot == Some(call) {
        *slot = None;
        true
    } else {
        tracing::debug!(call, "Dropping result of a call no longer in flight");
        false
    }
}

pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    catalog: CatalogStore,
    schema: SchemaClient,
    session: QuerySessionController,
    history: HistoryClient,
    upload: UploadWorkflow,
    refresh_rx: watch::Receiver<u64>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<ClientEvent>,
    poll_interval: Duration,
    pending_delete: Option<PendingDeletion>,
    in_flight: InFlight,
    /// Last backend failure of a switch, delete or upload, for [`Self::perform`].
    failure: Option<ClientError>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>, config: &ClientConfig) -> Self {
        let refresh = RefreshSignal::new();
        let refresh_rx = refresh.subscribe();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (events, _rx) = broadcast::channel(256);
        Self {
            catalog: CatalogStore::new(refresh),
            schema: SchemaClient::new(),
            session: QuerySessionController::new(Arc::clone(&backend)),
            history: HistoryClient::new(),
            upload: UploadWorkflow::new(Arc::clone(&backend), config.max_upload_bytes),
            backend,
            refresh_rx,
            completion_tx,
            completion_rx,
            events,
            poll_interval: config.poll_interval,
            pending_delete: None,
            in_flight: InFlight::default(),
            failure: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn schema(&self) -> &SchemaClient {
        &self.schema
    }

    pub fn session(&self) -> &QuerySessionController {
        &self.session
    }

    pub fn history(&self) -> &HistoryClient {
        &self.history
    }

    pub fn pending_delete(&self) -> Option<&PendingDeletion> {
        self.pending_delete.as_ref()
    }

    /// Initial load: start the catalog listing, the history fetch and one
    /// schema fetch. [`settle`](Self::settle) waits for them.
    pub fn activate(&mut self) {
        self.start_listing();
        self.start_history_fetch();
        self.start_schema_fetch();
        self.publish_catalog();
    }

    /// Handle one user event. Only local rejections come back here; calls
    /// the event starts report later, and their failures are published as
    /// [`ClientEvent::Error`].
    pub fn dispatch(&mut self, event: AppEvent) -> ClientResult<()> {
        let label = event.label();
        let result = self.handle_event(event);
        self.sync_refresh();
        if let Err(e) = &result {
            self.report(label, e);
        }
        result
    }

    /// Dispatch `event` and settle. Fails with the local rejection, or with
    /// the backend's answer to a switch, delete or upload it started.
    pub async fn perform(&mut self, event: AppEvent) -> ClientResult<()> {
        self.failure = None;
        self.dispatch(event)?;
        self.settle().await;
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn handle_event(&mut self, event: AppEvent) -> ClientResult<()> {
        match event {
            AppEvent::EditQuestion(text) => {
                if self.session.set_question(text) {
                    self.publish_session();
                }
            }
            AppEvent::SelectExample(index) => match EXAMPLE_QUESTIONS.get(index) {
                Some(question) => {
                    if self.session.set_question(*question) {
                        self.publish_session();
                    }
                }
                None => tracing::debug!(index, "No such example question"),
            },
            AppEvent::LoadHistoryEntry(index) => {
                let Some(entry) = self.history.get(index).cloned() else {
                    tracing::debug!(index, "No such history entry");
                    return Ok(());
                };
                let changed = self.session.handle(SessionInput::LoadHistory {
                    question: entry.question,
                    sql: entry.sql,
                });
                if changed {
                    self.publish_session();
                }
            }
            AppEvent::SubmitQuestion => {
                if self.session.session().question.trim().is_empty() {
                    return Err(ValidationError::EmptyQuestion.into());
                }
                if self.session.handle(SessionInput::Submit) {
                    self.publish_session();
                }
            }
            AppEvent::Ask(question) => {
                if question.trim().is_empty() {
                    return Err(ValidationError::EmptyQuestion.into());
                }
                if self.session.submit_question(question) {
                    self.publish_session();
                }
            }
            AppEvent::ExecuteQuery(sql) => {
                if sql.trim().is_empty() {
                    return Err(ValidationError::EmptyQuery.into());
                }
                if self.session.execute_query(sql) {
                    self.publish_session();
                }
            }
            AppEvent::ExecuteGenerated => {
                if self.session.session().sql.is_none() {
                    return Err(ValidationError::EmptyQuery.into());
                }
                if self.session.execute_generated() {
                    self.publish_session();
                }
            }
            AppEvent::SwitchSource(name) => {
                if self.in_flight.switch.is_some() {
                    tracing::debug!(source = %name, "Switch already in flight; ignoring");
                    return Ok(());
                }
                let call = self.in_flight.next();
                self.in_flight.switch = Some(call);
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    let result = backend.switch_source(&name).await;
                    Completion::Switch { call, name, result }
                });
            }
            AppEvent::RequestDelete(name) => {
                let pending = self.catalog.prepare_delete(&name)?;
                self.publish(ClientEvent::DeletePrompt {
                    name: pending.name().to_string(),
                    prompt: pending.prompt().to_string(),
                });
                self.pending_delete = Some(pending);
            }
            AppEvent::ConfirmDelete(name) => {
                if self.in_flight.delete.is_some() {
                    tracing::debug!(source = %name, "Delete already in flight; ignoring");
                    return Ok(());
                }
                let pending = match self.pending_delete.take() {
                    Some(pending) if pending.name() == name => pending,
                    other => {
                        self.pending_delete = other;
                        return Err(ValidationError::DeleteNotConfirmed { name }.into());
                    }
                };
                let call = self.in_flight.next();
                self.in_flight.delete = Some(call);
                let backend = Arc::clone(&self.backend);
                let name = pending.name().to_string();
                self.spawn(async move {
                    let result = backend.delete_source(&name).await;
                    Completion::Delete { call, name, result }
                });
            }
            AppEvent::CancelDelete => {
                self.pending_delete = None;
            }
            AppEvent::Upload(candidate) => {
                if self.upload_in_flight() {
                    return Ok(());
                }
                self.upload
                    .precheck(&candidate.file_name, Some(candidate.size()))?;
                let upload = self.upload.clone();
                self.start_upload(async move { upload.submit(candidate).await });
            }
            AppEvent::UploadPath(path) => {
                if self.upload_in_flight() {
                    return Ok(());
                }
                // Size is checked on the task, from file metadata.
                self.upload.precheck(&file_name_of(&path), None)?;
                let upload = self.upload.clone();
                self.start_upload(async move { upload.submit_path(&path).await });
            }
            AppEvent::ToggleTable(table) => {
                if self.schema.toggle(&table) {
                    self.publish_schema();
                }
            }
            AppEvent::RefreshCatalog => self.start_listing(),
            AppEvent::RefreshHistory => self.start_history_fetch(),
            AppEvent::Shutdown => {}
        }
        Ok(())
    }

    fn spawn(&self, call: impl Future<Output = Completion> + Send + 'static) {
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(call.await);
        });
    }

    fn upload_in_flight(&self) -> bool {
        let busy = self.in_flight.upload.is_some();
        if busy {
            tracing::debug!("Upload already in flight; ignoring");
        }
        busy
    }

    fn start_upload(
        &mut self,
        submit: impl Future<Output = ClientResult<UploadOutcome>> + Send + 'static,
    ) {
        let call = self.in_flight.next();
        self.in_flight.upload = Some(call);
        self.spawn(async move {
            let result = submit.await;
            Completion::Upload { call, result }
        });
    }

    fn start_listing(&mut self) {
        let ticket = self.catalog.begin_listing();
        self.in_flight.listings += 1;
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            let result = backend.list_sources().await;
            Completion::Listing { ticket, result }
        });
    }

    /// Timer tick: list unless a listing is already out.
    fn poll(&mut self) {
        if self.in_flight.listings == 0 {
            self.start_listing();
        }
    }

    /// A fetch already out publishes when it lands, so a second one is not
    /// started.
    fn start_history_fetch(&mut self) {
        if self.in_flight.history.is_some() {
            return;
        }
        let call = self.in_flight.next();
        self.in_flight.history = Some(call);
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            let result = backend.fetch_history().await;
            Completion::History { call, result }
        });
    }

    fn start_schema_fetch(&mut self) {
        let generation = self.schema.begin_fetch();
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            let fetch = fetch_schema(backend.as_ref()).await;
            Completion::Schema { generation, fetch }
        });
        self.publish_schema();
    }

    /// Start a schema fetch if the refresh signal moved since last seen.
    fn sync_refresh(&mut self) -> bool {
        if !self.refresh_rx.has_changed().unwrap_or(false) {
            return false;
        }
        self.refresh_rx.borrow_and_update();
        self.start_schema_fetch();
        true
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Schema { generation, fetch } => {
                if self.schema.apply(generation, fetch) {
                    self.publish_schema();
                }
            }
            Completion::Listing { ticket, result } => {
                self.in_flight.listings = self.in_flight.listings.saturating_sub(1);
                let outcome = self.catalog.apply_listing(ticket, result);
                self.on_listing(outcome);
            }
            Completion::Switch { call, name, result } => {
                if !finish(&mut self.in_flight.switch, call) {
                    return;
                }
                match result {
                    Ok(_) => {
                        self.catalog.apply_switch(&name);
                        self.session.source_changed();
                        self.publish_session();
                        self.publish_catalog();
                    }
                    Err(e) => self.fail(Operation::SwitchSource, e.into()),
                }
            }
            Completion::Delete { call, name, result } => {
                if !finish(&mut self.in_flight.delete, call) {
                    return;
                }
                match result {
                    Ok(_) => {
                        self.catalog.apply_delete(&name);
                        self.publish_catalog();
                        // The backend decides what is active now.
                        self.start_listing();
                    }
                    Err(e) => self.fail(Operation::DeleteSource, e.into()),
                }
            }
            Completion::Upload { call, result } => {
                if !finish(&mut self.in_flight.upload, call) {
                    return;
                }
                match result {
                    Ok(outcome) => self.apply_upload(outcome),
                    Err(e) => self.fail(Operation::UploadFile, e),
                }
            }
            Completion::History { call, result } => {
                if !finish(&mut self.in_flight.history, call) {
                    return;
                }
                // Published either way; a failed fetch keeps the old list.
                self.history.apply(result);
                self.publish_history();
            }
        }
    }

    fn apply_upload(&mut self, outcome: UploadOutcome) {
        self.catalog.apply_upload(&outcome);
        self.session.source_changed();
        self.publish_session();
        self.publish_catalog();
        self.publish(ClientEvent::UploadCompleted { outcome });
    }

    fn on_listing(&mut self, outcome: ListingOutcome) {
        if outcome.active_changed && self.session.source_changed() {
            self.publish_session();
        }
        if outcome.changed || outcome.active_changed {
            self.publish_catalog();
        }
    }

    fn report(&self, operation: &str, e: &ClientError) {
        if e.is_validation() {
            tracing::debug!(operation, error = %e, "Rejected before any request");
        } else {
            tracing::warn!(operation, error = %e, "Operation failed");
        }
        self.publish(ClientEvent::Error {
            operation: operation.to_string(),
            message: e.user_message(),
        });
    }

    fn fail(&mut self, operation: Operation, e: ClientError) {
        self.report(operation.as_str(), &e);
        self.failure = Some(e);
    }

    fn busy(&self) -> bool {
        self.session.awaiting() || self.schema.is_loading() || self.in_flight.any()
    }

    /// Process completions until nothing current is outstanding.
    pub async fn settle(&mut self) {
        while self.busy() {
            tokio::select! {
                Some(completion) = self.session.next_completion() => {
                    if self.session.apply_completion(completion) {
                        self.publish_session();
                    }
                }
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
            }
            self.sync_refresh();
        }
    }

    /// Wait for detached history writes to finish.
    pub async fn flush_history(&mut self) {
        self.session.flush_history().await;
    }

    /// Run until [`AppEvent::Shutdown`] or until every sender is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<AppEvent>) {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        self.activate();
        tracing::debug!(backend = self.backend.name(), "Client loop started");

        loop {
            tokio::select! {
                Some(completion) = self.session.next_completion() => {
                    if self.session.apply_completion(completion) {
                        self.publish_session();
                    }
                }
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
                _ = poll.tick() => self.poll(),
                event = events.recv() => match event {
                    None | Some(AppEvent::Shutdown) => break,
                    Some(event) => {
                        let _ = self.dispatch(event);
                    }
                },
            }
            self.sync_refresh();
        }

        self.session.flush_history().await;
        tracing::debug!("Client loop stopped");
    }

    fn publish(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn publish_session(&self) {
        self.publish(ClientEvent::SessionChanged {
            session: self.session.session().clone(),
        });
    }

    fn publish_catalog(&self) {
        self.publish(ClientEvent::CatalogChanged {
            catalog: self.catalog.snapshot(),
        });
    }

    fn publish_schema(&self) {
        self.publish(ClientEvent::SchemaChanged {
            schema: self.schema.view().clone(),
        });
    }

    fn publish_history(&self) {
        self.publish(ClientEvent::HistoryChanged {
            entries: self.history.entries().to_vec(),
        });
    }
}
