// crates/core/src/upload.rs
//! Local validation and submission of data files.

use std::path::Path;
use std::sync::Arc;

use text2sql_types::UploadOutcome;

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult, ValidationError};

/// Accepted file extensions, lower-case, without the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "json", "sql", "db", "sqlite"];

/// Size ceiling for uploads: 10 MiB. Files of this size or larger are rejected.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Lower-cased text after the last `.` of the file name, or empty.
pub fn extension_of(file_name: &str) -> String {
    let base = file_name.rsplit(&['/', '\\'][..]).next().unwrap_or(file_name);
    match base.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Reject file names outside the allow-list.
pub fn check_extension(file_name: &str) -> Result<(), ValidationError> {
    let extension = extension_of(file_name);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedExtension { extension });
    }
    Ok(())
}

/// Check name and size before anything touches the network.
pub fn validate(file_name: &str, size: u64, max_bytes: u64) -> Result<(), ValidationError> {
    check_extension(file_name)?;
    if size >= max_bytes {
        return Err(ValidationError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }
    Ok(())
}

/// A file picked for upload, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadCandidate {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Cheap to clone; the scheduler moves a copy into each upload task.
#[derive(Clone)]
pub struct UploadWorkflow {
    backend: Arc<dyn Backend>,
    max_bytes: u64,
}

impl UploadWorkflow {
    pub fn new(backend: Arc<dyn Backend>, max_bytes: u64) -> Self {
        Self { backend, max_bytes }
    }

    /// The checks that need no I/O: extension, and size when it is known.
    pub fn precheck(&self, file_name: &str, size: Option<u64>) -> Result<(), ValidationError> {
        match size {
            Some(size) => validate(file_name, size, self.max_bytes),
            None => check_extension(file_name),
        }
    }

    /// Validate and submit. The caller applies a successful outcome to the
    /// catalog; a failure leaves nothing behind, so the same candidate can be
    /// submitted again.
    pub async fn submit(&self, candidate: UploadCandidate) -> ClientResult<UploadOutcome> {
        validate(&candidate.file_name, candidate.size(), self.max_bytes)?;
        let outcome = self
            .backend
            .upload_file(&candidate.file_name, candidate.bytes)
            .await?;
        tracing::info!(
            table = %outcome.table_name,
            rows = outcome.row_count,
            columns = outcome.column_count,
            "Upload ingested"
        );
        Ok(outcome)
    }

    /// Read `path` and submit it. The size check runs on file metadata, so an
    /// oversized file is never read into memory.
    pub async fn submit_path(&self, path: &Path) -> ClientResult<UploadOutcome> {
        let candidate = read_candidate(path, self.max_bytes).await?;
        self.submit(candidate).await
    }
}

/// Name of the file `path` points at, as sent to the backend.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Validate `path` from its metadata, then load it.
pub async fn read_candidate(path: &Path, max_bytes: u64) -> ClientResult<UploadCandidate> {
    let file_name = file_name_of(path);
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ClientError::io(path, e))?;
    validate(&file_name, metadata.len(), max_bytes)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ClientError::io(path, e))?;
    Ok(UploadCandidate::new(file_name, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("sales.CSV"), "csv");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("dir.d/data"), "");
        assert_eq!(extension_of(".hidden"), "hidden");
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        for name in ["a.csv", "a.XLSX", "a.xls", "a.Json", "a.sql", "a.db", "a.SQLite"] {
            assert!(validate(name, 1, MAX_UPLOAD_BYTES).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_rejects_extension_by_name() {
        let err = validate("payload.exe", 1, MAX_UPLOAD_BYTES).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedExtension {
                extension: "exe".into()
            }
        );
        assert!(err.to_string().contains(".exe"));
    }

    #[test]
    fn test_size_ceiling_is_exclusive() {
        assert!(validate("a.csv", MAX_UPLOAD_BYTES - 1, MAX_UPLOAD_BYTES).is_ok());
        let err = validate("a.csv", MAX_UPLOAD_BYTES, MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));
        assert!(err.to_string().contains("10MB"));
    }

    #[tokio::test]
    async fn test_read_candidate_checks_metadata_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.csv");
        std::fs::write(&path, vec![b'x'; 64]).unwrap();

        let err = read_candidate(&path, 32).await.unwrap_err();
        assert!(err.is_validation());

        let candidate = read_candidate(&path, 1024).await.unwrap();
        assert_eq!(candidate.file_name, "big.csv");
        assert_eq!(candidate.size(), 64);
    }

    #[tokio::test]
    async fn test_read_candidate_missing_file() {
        let err = read_candidate(Path::new("/nonexistent/sales.csv"), MAX_UPLOAD_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io { .. }));
    }
}
