use std::path::PathBuf;
use thiserror::Error;

/// Failures callers may want to tell apart. Carried inside `anyhow::Error`,
/// recover them with `err.downcast_ref::<LedgerError>()`.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("cannot parse date {input:?} with format {format:?}")]
    InvalidDate { input: String, format: String },

    #[error("column names ({names}) and types ({types}) should have the same length")]
    SchemaMismatch { types: usize, names: usize },

    #[error("source {name} has no type header line")]
    EmptySource { name: String },

    #[error("records are not sorted by date (first out-of-order record at index {index})")]
    UnsortedRecords { index: usize },

    #[error("snapshot to {path} failed: {reason}")]
    SnapshotFailed { path: PathBuf, reason: String },

    #[error("classifier path {path} must be a regular file")]
    ClassifierNotAFile { path: PathBuf },

    #[error("separator {separator:?} must be a single ASCII character")]
    InvalidSeparator { separator: char },
}
