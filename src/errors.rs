use std::path::PathBuf;

use thiserror::Error;

use crate::recording::Id;
use crate::validation::ValidationError;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents a record that failed creation-time validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Represents an update aimed at a record that doesn't exist.
    #[error("no record with ID {0}")]
    NonExistentId(Id),

    /// Represents an SQL error.
    #[error("SQLx error: {source}")]
    Sqlx { source: sqlx::Error },

    /// Represents a collision on the unique external token.
    #[error("external ID already exists in database")]
    DuplicateExternalId,

    /// Represents a store that can't currently serve requests.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Represents a reconciliation that was rolled back as a whole.
    #[error("reconciliation rolled back: {source}")]
    ReconcileAborted {
        #[source]
        source: Box<BackendError>,
    },

    /// Represents a required environment variable that isn't set.
    #[error("must define {0} environment variable")]
    MissingVariable(String),

    /// Represents an environment variable that couldn't be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidVariable { name: String, value: String },

    /// Represents a failed filesystem operation.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Represents a failure while writing CSV.
    #[error("CSV error: {source}")]
    Csv { source: csv::Error },

    /// Represents edited rows that couldn't be parsed at all.
    #[error("malformed rows: {0}")]
    MalformedRows(serde_json::Error),

    /// Represents a creation request that couldn't be parsed at all.
    #[error("malformed record: {0}")]
    MalformedRecord(serde_json::Error),

    /// Represents an ingest target that's already taken.
    #[error("file {0:?} already exists")]
    FileAlreadyExists(PathBuf),

    /// Represents a file that isn't a motion capture file.
    #[error("unsupported file {0:?}, expected a .bvh file")]
    UnsupportedFile(PathBuf),

    /// Represents a record without a source file to read.
    #[error("record {0} has no file path")]
    MissingFilePath(Id),
}

impl BackendError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<csv::Error> for BackendError {
    fn from(source: csv::Error) -> Self {
        BackendError::Csv { source }
    }
}
