// crates/cli/src/shell.rs
//! Interactive shell.
//!
//! Stdin lines become [`AppEvent`]s for the orchestrator's run loop; a
//! printer task renders the [`ClientEvent`]s it publishes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use text2sql_core::{AppEvent, Backend, ClientConfig, Orchestrator};
use text2sql_types::{CatalogSnapshot, ClientEvent, Phase, QuerySession, SchemaView};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use crate::format;

const HELP: &str = "\
Type a question to generate SQL, or a command:
  :ask            generate again for the current question
  :run            execute the generated query
  :sql <query>    execute the given SQL
  :use <name>     switch the active source
  :delete <name>  delete an uploaded source (confirm with :yes)
  :upload <path>  upload a file as a new source
  :schema         show tables of the active source
  :toggle <table> expand or collapse a table
  :sources        list data sources
  :history        list recent questions
  :load <n>       load history entry n
  :example <n>    use example question n
  :help           this text
  :quit           leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Question(String),
    Ask,
    Run,
    Sql(String),
    Use(String),
    Delete(String),
    Yes,
    Upload(PathBuf),
    Schema,
    Toggle(String),
    Sources,
    History,
    /// Zero-based index into the history list.
    Load(usize),
    /// Zero-based index into the example questions.
    Example(usize),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Parse one input line. Numbered commands take 1-based input.
pub fn parse_line(line: &str) -> ShellCommand {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return ShellCommand::Question(line.to_string());
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    let needs_arg = |make: fn(String) -> ShellCommand| {
        if arg.is_empty() {
            ShellCommand::Invalid(format!(":{name} needs an argument"))
        } else {
            make(arg.to_string())
        }
    };
    let index = |make: fn(usize) -> ShellCommand| match arg.parse::<usize>() {
        Ok(n) if n >= 1 => make(n - 1),
        _ => ShellCommand::Invalid(format!(":{name} needs a number from 1")),
    };

    match name {
        "ask" => ShellCommand::Ask,
        "run" => ShellCommand::Run,
        "sql" => needs_arg(ShellCommand::Sql),
        "use" => needs_arg(ShellCommand::Use),
        "delete" => needs_arg(ShellCommand::Delete),
        "yes" => ShellCommand::Yes,
        "upload" => needs_arg(|path| ShellCommand::Upload(PathBuf::from(path))),
        "schema" => ShellCommand::Schema,
        "toggle" => needs_arg(ShellCommand::Toggle),
        "sources" => ShellCommand::Sources,
        "history" => ShellCommand::History,
        "load" => index(ShellCommand::Load),
        "example" => index(ShellCommand::Example),
        "help" | "h" | "?" => ShellCommand::Help,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        other => ShellCommand::Invalid(format!("Unknown command :{other}")),
    }
}

/// Requests the printer answers from its cached state.
#[derive(Debug)]
enum View {
    Schema,
    Sources,
    History,
}

pub async fn run(backend: Arc<dyn Backend>, config: &ClientConfig) -> Result<()> {
    let app = Orchestrator::new(backend, config);
    let events = app.subscribe();
    let (tx, rx) = mpsc::channel(32);
    let (view_tx, view_rx) = mpsc::unbounded_channel();

    let client = tokio::spawn(app.run(rx));
    let printer = tokio::spawn(print_events(events, view_rx));

    println!("{HELP}\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_delete: Option<String> = None;
    while let Some(line) = lines.next_line().await? {
        let event = match parse_line(&line) {
            ShellCommand::Empty => continue,
            ShellCommand::Quit => break,
            ShellCommand::Help => {
                println!("{HELP}");
                continue;
            }
            ShellCommand::Invalid(message) => {
                println!("  {message}");
                continue;
            }
            ShellCommand::Schema => {
                let _ = view_tx.send(View::Schema);
                continue;
            }
            ShellCommand::Sources => {
                let _ = view_tx.send(View::Sources);
                AppEvent::RefreshCatalog
            }
            ShellCommand::History => {
                let _ = view_tx.send(View::History);
                AppEvent::RefreshHistory
            }
            ShellCommand::Question(text) => AppEvent::Ask(text),
            ShellCommand::Ask => AppEvent::SubmitQuestion,
            ShellCommand::Run => AppEvent::ExecuteGenerated,
            ShellCommand::Sql(sql) => AppEvent::ExecuteQuery(sql),
            ShellCommand::Use(name) => AppEvent::SwitchSource(name),
            ShellCommand::Delete(name) => {
                pending_delete = Some(name.clone());
                AppEvent::RequestDelete(name)
            }
            ShellCommand::Yes => match pending_delete.take() {
                Some(name) => AppEvent::ConfirmDelete(name),
                None => {
                    println!("  Nothing to confirm");
                    continue;
                }
            },
            ShellCommand::Upload(path) => AppEvent::UploadPath(path),
            ShellCommand::Toggle(table) => AppEvent::ToggleTable(table),
            ShellCommand::Load(index) => AppEvent::LoadHistoryEntry(index),
            ShellCommand::Example(index) => AppEvent::SelectExample(index),
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }

    let _ = tx.send(AppEvent::Shutdown).await;
    drop(tx);
    client.await?;
    drop(view_tx);
    printer.await?;
    Ok(())
}

/// Last published state, for `:schema`, `:sources` and `:history`.
#[derive(Default)]
struct Printer {
    session: QuerySession,
    catalog: Option<CatalogSnapshot>,
    schema: SchemaView,
    show_sources: bool,
    show_history: bool,
}

impl Printer {
    fn on_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::SessionChanged { session } => self.on_session(session),
            ClientEvent::CatalogChanged { catalog } => {
                let switched = self
                    .catalog
                    .as_ref()
                    .map_or(true, |previous| previous.active != catalog.active);
                if switched {
                    println!("  \u{2713} Active source: {}", catalog.active_label);
                }
                if std::mem::take(&mut self.show_sources) {
                    println!("{}", format::sources(&catalog));
                }
                self.catalog = Some(catalog);
            }
            ClientEvent::SchemaChanged { schema } => self.schema = schema,
            ClientEvent::HistoryChanged { entries } => {
                if std::mem::take(&mut self.show_history) {
                    println!("{}", format::history(&entries));
                }
            }
            ClientEvent::DeletePrompt { prompt, .. } => {
                println!("  {prompt} Type :yes to confirm.");
            }
            ClientEvent::UploadCompleted { outcome } => {
                println!("  \u{2713} {}", format::upload(&outcome));
            }
            ClientEvent::Error { message, .. } => println!("  \u{2717} {message}"),
        }
    }

    fn on_view(&mut self, view: View) {
        match view {
            View::Schema => println!("{}", format::schema(&self.schema)),
            View::Sources => self.show_sources = true,
            View::History => self.show_history = true,
        }
    }

    fn on_session(&mut self, session: QuerySession) {
        let previous = std::mem::replace(&mut self.session, session);
        let session = &self.session;
        if previous.phase == session.phase
            && previous.sql == session.sql
            && previous.question == session.question
        {
            return;
        }
        match session.phase {
            Phase::Idle => {
                if previous.question != session.question && !session.question.is_empty() {
                    println!("  Question: {}", session.question);
                }
            }
            Phase::Generating => println!("  Generating SQL..."),
            Phase::Generated => {
                if let Some(sql) = session.sql.as_deref() {
                    print!("{}", format::generated(sql, session.explanation.as_deref()));
                }
            }
            Phase::Executing => println!("  Running query..."),
            Phase::Executed => {
                if let Some(result) = session.result.as_ref() {
                    println!("{}", format::execution_result(result));
                }
            }
            Phase::GenerationFailed | Phase::ExecutionFailed => {
                println!("  \u{2717} {}", session.error.as_deref().unwrap_or_default());
            }
        }
    }
}

async fn print_events(
    mut events: broadcast::Receiver<ClientEvent>,
    mut views: mpsc::UnboundedReceiver<View>,
) {
    let mut printer = Printer::default();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => printer.on_event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Printer fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(view) = views.recv() => printer.on_view(view),
        }
    }
}
