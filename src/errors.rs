use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while loading, mutating or persisting a
/// benchmark history.
#[derive(Debug, Error)]
pub enum Error {
    /// The persisted snapshot is unparseable or structurally invalid. Fatal
    /// for the operation; the on-disk file is left untouched.
    #[error("corrupt history snapshot: {0}")]
    CorruptHistory(String),

    /// A query named a benchmark group that does not exist.
    #[error("unknown benchmark group '{0}'")]
    UnknownGroup(String),

    /// A baseline commit id was requested that is not in the group.
    #[error("baseline commit '{0}' not found in group")]
    UnknownBaseline(String),

    #[error("invalid measurement '{name}': {reason}")]
    InvalidMeasurement { name: String, reason: String },

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("duplicate measurement '{0}' within one entry")]
    DuplicateMeasurement(String),

    /// Another writer holds the store lock. Retryable by the caller.
    #[error("history store is busy: lock file {0} exists")]
    Busy(PathBuf),

    #[error("failed to parse benchmark input: {0}")]
    BadInput(String),

    #[error("bad configuration: {0}")]
    BadConfig(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn io(path: &std::path::Path, source: io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
