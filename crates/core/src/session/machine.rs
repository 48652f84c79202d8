// crates/core/src/session/machine.rs
//! Pure transition function for the query session.
//!
//! [`SessionMachine::handle`] never performs I/O. It mutates the session and
//! returns the [`Effect`]s the caller must run; results come back in as
//! `*Settled` inputs tagged with the request they answer.

use text2sql_types::{ExecutionResult, GeneratedQuery, Phase, QuerySession};

/// Identifies one generation or execution call.
pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// Typing in the question box. Ignored while generating.
    EditQuestion(String),
    /// Load a past entry; with SQL, the session becomes `Generated` locally.
    /// Without SQL it is a question edit, and ignored while generating.
    LoadHistory {
        question: String,
        sql: Option<String>,
    },
    /// Generate a query for the current question.
    Submit,
    /// Run this query text.
    Execute(String),
    GenerationSettled {
        request: RequestId,
        outcome: Result<GeneratedQuery, String>,
    },
    ExecutionSettled {
        request: RequestId,
        outcome: Result<ExecutionResult, String>,
    },
    /// The active source changed underneath the session.
    SourceChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Generate { request: RequestId, question: String },
    Execute { request: RequestId, sql: String },
    /// Best effort; never feeds back into the machine.
    RecordHistory { question: String, sql: String },
}

#[derive(Debug, Default, PartialEq)]
pub struct Transition {
    pub effects: Vec<Effect>,
    /// The visible session changed.
    pub changed: bool,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    fn changed() -> Self {
        Self {
            effects: Vec::new(),
            changed: true,
        }
    }

    fn with(effect: Effect) -> Self {
        Self {
            effects: vec![effect],
            changed: true,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingExecution {
    request: RequestId,
    question: String,
    sql: String,
}

#[derive(Debug, Default)]
pub struct SessionMachine {
    session: QuerySession,
    next_request: RequestId,
    generation: Option<RequestId>,
    execution: Option<PendingExecution>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &QuerySession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    /// A generation or execution result is still expected.
    pub fn awaiting(&self) -> bool {
        self.generation.is_some() || self.execution.is_some()
    }

    pub fn handle(&mut self, input: SessionInput) -> Transition {
        let from = self.session.phase;
        let transition = match input {
            SessionInput::EditQuestion(text) => self.edit_question(text),
            SessionInput::LoadHistory { question, sql } => self.load_history(question, sql),
            SessionInput::Submit => self.submit(),
            SessionInput::Execute(sql) => self.execute(sql),
            SessionInput::GenerationSettled { request, outcome } => {
                self.generation_settled(request, outcome)
            }
            SessionInput::ExecutionSettled { request, outcome } => {
                self.execution_settled(request, outcome)
            }
            SessionInput::SourceChanged => self.source_changed(),
        };
        if from != self.session.phase {
            tracing::debug!(from = ?from, to = ?self.session.phase, "Session phase changed");
        }
        transition
    }

    fn next_request(&mut self) -> RequestId {
        self.next_request += 1;
        self.next_request
    }

    fn edit_question(&mut self, text: String) -> Transition {
        if self.session.phase == Phase::Generating || self.session.question == text {
            return Transition::none();
        }
        self.session.question = text;
        Transition::changed()
    }

    fn load_history(&mut self, question: String, sql: Option<String>) -> Transition {
        let Some(sql) = sql else {
            return self.edit_question(question);
        };
        self.session.question = question;
        self.generation = None;
        self.execution = None;
        self.session.sql = Some(sql);
        self.session.explanation = None;
        self.session.result = None;
        self.session.error = None;
        self.session.phase = Phase::Generated;
        Transition::changed()
    }

    fn submit(&mut self) -> Transition {
        if self.session.question.trim().is_empty() || self.session.phase == Phase::Generating {
            return Transition::none();
        }
        let request = self.next_request();
        self.generation = Some(request);
        self.execution = None;
        self.session.sql = None;
        self.session.explanation = None;
        self.session.result = None;
        self.session.error = None;
        self.session.phase = Phase::Generating;
        Transition::with(Effect::Generate {
            request,
            question: self.session.question.clone(),
        })
    }

    fn execute(&mut self, sql: String) -> Transition {
        if sql.trim().is_empty() || self.session.phase.is_in_flight() {
            return Transition::none();
        }
        let request = self.next_request();
        self.execution = Some(PendingExecution {
            request,
            question: self.session.question.clone(),
            sql: sql.clone(),
        });
        self.session.sql = Some(sql.clone());
        self.session.error = None;
        self.session.phase = Phase::Executing;
        Transition::with(Effect::Execute { request, sql })
    }

    fn generation_settled(
        &mut self,
        request: RequestId,
        outcome: Result<GeneratedQuery, String>,
    ) -> Transition {
        if self.generation != Some(request) {
            tracing::debug!(request, "Dropping stale generation result");
            return Transition::none();
        }
        self.generation = None;
        match outcome {
            Ok(generated) => {
                self.session.sql = Some(generated.sql);
                self.session.explanation = Some(generated.explanation);
                self.session.phase = Phase::Generated;
            }
            Err(message) => {
                self.session.error = Some(message);
                self.session.phase = Phase::GenerationFailed;
            }
        }
        Transition::changed()
    }

    fn execution_settled(
        &mut self,
        request: RequestId,
        outcome: Result<ExecutionResult, String>,
    ) -> Transition {
        let pending = match self.execution.take() {
            Some(pending) if pending.request == request => pending,
            other => {
                self.execution = other;
                tracing::debug!(request, "Dropping stale execution result");
                return Transition::none();
            }
        };
        match outcome {
            Ok(result) => {
                self.session.result = Some(result);
                self.session.phase = Phase::Executed;
                Transition::with(Effect::RecordHistory {
                    question: pending.question,
                    sql: pending.sql,
                })
            }
            Err(message) => {
                self.session.result = None;
                self.session.error = Some(message);
                self.session.phase = Phase::ExecutionFailed;
                Transition::changed()
            }
        }
    }

    fn source_changed(&mut self) -> Transition {
        self.generation = None;
        self.execution = None;
        let question = std::mem::take(&mut self.session.question);
        let before = std::mem::take(&mut self.session);
        self.session.question = question;
        Transition {
            effects: Vec::new(),
            changed: before.phase != Phase::Idle
                || before.sql.is_some()
                || before.result.is_some()
                || before.error.is_some(),
        }
    }
}
