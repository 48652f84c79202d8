// crates/core/src/session/controller.rs
//! Effect executor for [`SessionMachine`].

use std::sync::Arc;

use text2sql_types::{ExecutionResult, GeneratedQuery, Phase, QuerySession};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::machine::{Effect, RequestId, SessionInput, SessionMachine};
use crate::backend::Backend;
use crate::history;

/// A finished network call, on its way back into the machine.
#[derive(Debug)]
pub enum SessionCompletion {
    Generation {
        request: RequestId,
        outcome: Result<GeneratedQuery, String>,
    },
    Execution {
        request: RequestId,
        outcome: Result<ExecutionResult, String>,
    },
}

impl From<SessionCompletion> for SessionInput {
    fn from(completion: SessionCompletion) -> Self {
        match completion {
            SessionCompletion::Generation { request, outcome } => {
                SessionInput::GenerationSettled { request, outcome }
            }
            SessionCompletion::Execution { request, outcome } => {
                SessionInput::ExecutionSettled { request, outcome }
            }
        }
    }
}

/// Owns the one live [`QuerySession`].
///
/// Calls run on spawned tasks and report back through an internal channel;
/// the owner feeds them in with [`apply_completion`](Self::apply_completion),
/// so all session mutation happens on the owner's task.
pub struct QuerySessionController {
    machine: SessionMachine,
    backend: Arc<dyn Backend>,
    tx: mpsc::UnboundedSender<SessionCompletion>,
    rx: mpsc::UnboundedReceiver<SessionCompletion>,
    history_tasks: Vec<JoinHandle<()>>,
}

impl QuerySessionController {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            machine: SessionMachine::new(),
            backend,
            tx,
            rx,
            history_tasks: Vec::new(),
        }
    }

    pub fn session(&self) -> &QuerySession {
        self.machine.session()
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    /// A generation or execution result is still expected.
    pub fn awaiting(&self) -> bool {
        self.machine.awaiting()
    }

    /// Apply `input` and start whatever calls it asks for. Returns whether
    /// the visible session changed.
    pub fn handle(&mut self, input: SessionInput) -> bool {
        let transition = self.machine.handle(input);
        for effect in transition.effects {
            self.run(effect);
        }
        transition.changed
    }

    pub fn set_question(&mut self, text: impl Into<String>) -> bool {
        self.handle(SessionInput::EditQuestion(text.into()))
    }

    /// Set the question and request generation.
    pub fn submit_question(&mut self, text: impl Into<String>) -> bool {
        let edited = self.set_question(text);
        self.handle(SessionInput::Submit) || edited
    }

    pub fn execute_query(&mut self, sql: impl Into<String>) -> bool {
        self.handle(SessionInput::Execute(sql.into()))
    }

    /// Execute the generated query, if there is one.
    pub fn execute_generated(&mut self) -> bool {
        match self.machine.session().sql.clone() {
            Some(sql) => self.execute_query(sql),
            None => false,
        }
    }

    pub fn source_changed(&mut self) -> bool {
        self.handle(SessionInput::SourceChanged)
    }

    /// Wait for the next finished call. Never resolves to `None` while the
    /// controller is alive.
    pub async fn next_completion(&mut self) -> Option<SessionCompletion> {
        self.rx.recv().await
    }

    pub fn apply_completion(&mut self, completion: SessionCompletion) -> bool {
        self.handle(completion.into())
    }

    /// Wait for detached history writes. Only for shutdown paths that would
    /// otherwise abort them; the session never depends on these.
    pub async fn flush_history(&mut self) {
        for task in self.history_tasks.drain(..) {
            let _ = task.await;
        }
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Generate { request, question } => {
                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let outcome = backend
                        .generate_query(&question)
                        .await
                        .map_err(|e| {
                            tracing::debug!(error = %e, request, "Generation failed");
                            e.user_message()
                        });
                    let _ = tx.send(SessionCompletion::Generation { request, outcome });
                });
            }
            Effect::Execute { request, sql } => {
                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let outcome = backend.execute_query(&sql).await.map_err(|e| {
                        tracing::debug!(error = %e, request, "Execution failed");
                        e.user_message()
                    });
                    let _ = tx.send(SessionCompletion::Execution { request, outcome });
                });
            }
            Effect::RecordHistory { question, sql } => {
                self.history_tasks.retain(|task| !task.is_finished());
                let task = history::spawn_record(Arc::clone(&self.backend), question, sql);
                self.history_tasks.push(task);
            }
        }
    }
}
