// crates/core/src/error.rs
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The boundary calls the client makes against the backend.
///
/// Each operation owns the stable message shown when the backend gives no
/// detail of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GenerateQuery,
    ExecuteQuery,
    RecordHistory,
    FetchHistory,
    ListSources,
    SwitchSource,
    DeleteSource,
    UploadFile,
    ActiveSchema,
    SampleCounts,
    Health,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GenerateQuery => "generate_query",
            Operation::ExecuteQuery => "execute_query",
            Operation::RecordHistory => "record_history",
            Operation::FetchHistory => "fetch_history",
            Operation::ListSources => "list_sources",
            Operation::SwitchSource => "switch_source",
            Operation::DeleteSource => "delete_source",
            Operation::UploadFile => "upload_file",
            Operation::ActiveSchema => "active_schema",
            Operation::SampleCounts => "sample_counts",
            Operation::Health => "health",
        }
    }

    /// Generic message surfaced when the backend supplied no detail.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::GenerateQuery => "Failed to generate SQL query",
            Operation::ExecuteQuery => "Failed to execute query",
            Operation::RecordHistory => "Failed to save history",
            Operation::FetchHistory => "Failed to load history",
            Operation::ListSources => "Failed to fetch databases",
            Operation::SwitchSource => "Failed to switch database",
            Operation::DeleteSource => "Failed to delete database",
            Operation::UploadFile => "Upload failed. Please try again.",
            Operation::ActiveSchema => "Failed to load schema",
            Operation::SampleCounts => "Failed to load sample data",
            Operation::Health => "Backend is unreachable",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local, pre-network rejections. These never reach the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unsupported file type {}. Please upload CSV, Excel, JSON, or SQL database files.", describe_extension(.extension))]
    UnsupportedExtension { extension: String },

    #[error("File too large. Maximum size is {}.", format_limit(.limit))]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("The built-in source \"{name}\" cannot be deleted")]
    BuiltInSource { name: String },

    #[error("Unknown data source: {name}")]
    UnknownSource { name: String },

    #[error("Delete of \"{name}\" was not confirmed")]
    DeleteNotConfirmed { name: String },
}

fn describe_extension(extension: &str) -> String {
    if extension.is_empty() {
        "(no extension)".to_string()
    } else {
        format!("\".{extension}\"")
    }
}

fn format_limit(limit: &u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if *limit >= MIB && limit % MIB == 0 {
        format!("{}MB", limit / MIB)
    } else {
        format!("{limit} bytes")
    }
}

/// A failed call against the backend.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{operation} failed with status {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Backend {
        operation: Operation,
        status: u16,
        detail: Option<String>,
    },

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned an unreadable response: {message}")]
    Decode { operation: Operation, message: String },
}

impl RequestError {
    pub fn backend(operation: Operation, status: u16, detail: Option<String>) -> Self {
        Self::Backend {
            operation,
            status,
            detail,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            RequestError::Backend { operation, .. }
            | RequestError::Transport { operation, .. }
            | RequestError::Decode { operation, .. } => *operation,
        }
    }

    /// Backend-provided detail text, when the error body carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            RequestError::Backend { detail, .. } => detail.as_deref().filter(|d| !d.is_empty()),
            _ => None,
        }
    }

    /// What the user should see: the backend detail if present, else the
    /// operation's generic message.
    pub fn user_message(&self) -> String {
        self.detail()
            .map(str::to_string)
            .unwrap_or_else(|| self.operation().fallback_message().to_string())
    }
}

/// Any failure a client operation can surface.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl ClientError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Message suitable for display: validation text as-is, backend detail
    /// or the per-operation fallback for request failures.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Request(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
