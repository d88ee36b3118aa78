//! Repository-level errors raised by a [`Worker`](crate::worker::Worker).

use std::path::PathBuf;
use thiserror::Error;

use crate::git::GitProcessError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("ignoring, \"{}\" is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("ignoring, the directory \"{}\" could not be listed: {source}", directory.display())]
    NotListable {
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ignoring, the directory \"{}\" is not empty", .0.display())]
    Occupied(PathBuf),

    #[error("could not create directory \"{}\": {source}", directory.display())]
    CreateDirectory {
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Process(#[from] GitProcessError),

    #[error("unexpected output from \"git {command}\": {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

impl WorkerError {
    /// Whether the target path itself prevents any git operation.
    ///
    /// These errors are raised before the repository is touched.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotADirectory(_) | Self::NotListable { .. } | Self::Occupied(_)
        )
    }
}
