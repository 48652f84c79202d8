// crates/cli/src/commands.rs
//! One-shot subcommands.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use text2sql_core::{AppEvent, Backend, ClientConfig, ClientError, Orchestrator};
use text2sql_types::{ClientEvent, QuerySession};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::format;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the backend and its database are reachable
    Health,
    /// List data sources
    Sources,
    /// Make a data source the active one
    Switch { name: String },
    /// Delete an uploaded data source
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Upload a CSV, Excel, JSON, SQL or SQLite file as a new source
    Upload { path: PathBuf },
    /// Show the active source's tables and columns
    Schema,
    /// Show recent questions
    History,
    /// Generate SQL for a question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Also execute the generated query
        #[arg(long)]
        run: bool,
    },
    /// Execute a SQL query against the active source
    Run { sql: String },
    /// Interactive session
    Shell,
}

/// What to tell the user when a command fails.
#[derive(Debug)]
struct Failure(String);

impl From<ClientError> for Failure {
    fn from(err: ClientError) -> Self {
        Failure(err.user_message())
    }
}

type CommandResult = Result<(), Failure>;

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run one subcommand and map its outcome to an exit status.
pub async fn execute(backend: Arc<dyn Backend>, config: &ClientConfig, command: Command) -> ExitCode {
    if let Command::Health = command {
        return health(backend.as_ref()).await;
    }

    let mut app = Orchestrator::new(backend, config);
    let pb = spinner("Connecting...");
    app.activate();
    app.settle().await;
    pb.finish_and_clear();

    let outcome = match command {
        Command::Sources => {
            println!("{}", format::sources(&app.catalog().snapshot()));
            Ok(())
        }
        Command::Switch { name } => switch(&mut app, name).await,
        Command::Delete { name, yes } => delete(&mut app, name, yes).await,
        Command::Upload { path } => upload(&mut app, path).await,
        Command::Schema => {
            println!("{}", format::schema(app.schema().view()));
            Ok(())
        }
        Command::History => {
            println!("{}", format::history(app.history().entries()));
            Ok(())
        }
        Command::Ask { question, run } => ask(&mut app, question.join(" "), run).await,
        Command::Run { sql } => run_sql(&mut app, sql).await,
        Command::Health | Command::Shell => Ok(()),
    };

    app.flush_history().await;

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure(message)) => {
            eprintln!("  \u{2717} {message}");
            ExitCode::FAILURE
        }
    }
}

async fn health(backend: &dyn Backend) -> ExitCode {
    match backend.health().await {
        Ok(status) => {
            println!(
                "{} ({}): status {}, database {}",
                backend.name(),
                status.service,
                status.status,
                status.database
            );
            if status.is_healthy() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Health check failed");
            eprintln!("  \u{2717} {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn switch(app: &mut Orchestrator, name: String) -> CommandResult {
    let pb = spinner("Switching...");
    let result = app.perform(AppEvent::SwitchSource(name)).await;
    pb.finish_and_clear();
    result?;
    println!("  \u{2713} Active source: {}", app.catalog().active_label());
    println!("{}", format::schema(app.schema().view()));
    Ok(())
}

async fn delete(app: &mut Orchestrator, name: String, yes: bool) -> CommandResult {
    app.dispatch(AppEvent::RequestDelete(name.clone()))?;
    let prompt = app
        .pending_delete()
        .map(|pending| pending.prompt().to_string())
        .unwrap_or_default();

    if !yes && !confirm(&prompt).await {
        app.dispatch(AppEvent::CancelDelete)?;
        println!("  Cancelled");
        return Ok(());
    }

    let pb = spinner("Deleting...");
    let result = app.perform(AppEvent::ConfirmDelete(name.clone())).await;
    pb.finish_and_clear();
    result?;
    println!(
        "  \u{2713} Deleted {name}; active source: {}",
        app.catalog().active_label()
    );
    Ok(())
}

async fn confirm(prompt: &str) -> bool {
    let mut stdout = tokio::io::stdout();
    let question = format!("{prompt} [y/N] ");
    if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
        return false;
    }
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    match stdin.read_line(&mut line).await {
        Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

async fn upload(app: &mut Orchestrator, path: PathBuf) -> CommandResult {
    let mut events = app.subscribe();
    let pb = spinner("Uploading...");
    let result = app.perform(AppEvent::UploadPath(path)).await;
    pb.finish_and_clear();
    result?;

    while let Ok(event) = events.try_recv() {
        if let ClientEvent::UploadCompleted { outcome } = event {
            println!("  \u{2713} {}", format::upload(&outcome));
        }
    }
    Ok(())
}

async fn ask(app: &mut Orchestrator, question: String, run: bool) -> CommandResult {
    let pb = spinner("Generating SQL...");
    let result = app.perform(AppEvent::Ask(question)).await;
    pb.finish_and_clear();
    result?;

    let session = app.session().session();
    check(session)?;
    if let Some(sql) = session.sql.as_deref() {
        print!("{}", format::generated(sql, session.explanation.as_deref()));
    }
    if !run {
        return Ok(());
    }

    run_query(app, AppEvent::ExecuteGenerated).await
}

async fn run_sql(app: &mut Orchestrator, sql: String) -> CommandResult {
    run_query(app, AppEvent::ExecuteQuery(sql)).await
}

async fn run_query(app: &mut Orchestrator, event: AppEvent) -> CommandResult {
    let pb = spinner("Running query...");
    let result = app.perform(event).await;
    pb.finish_and_clear();
    result?;

    let session = app.session().session();
    check(session)?;
    if let Some(result) = session.result.as_ref() {
        println!("{}", format::execution_result(result));
    }
    Ok(())
}

fn check(session: &QuerySession) -> CommandResult {
    if session.phase.is_failed() {
        return Err(Failure(session.error.clone().unwrap_or_default()));
    }
    Ok(())
}
