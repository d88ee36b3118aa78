//! Git command wrappers.
//!
//! Every interaction with the version-control client goes through [`Git::run`]:
//! the binary is spawned with its input closed, standard output is captured and
//! trimmed, and any non-zero exit becomes a [`GitProcessError`] carrying the
//! command, the directory, the exit code and the client's diagnostic text.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, trace};

use crate::constants::DEFAULT_GIT_BINARY;

/// Failure of a single git invocation.
#[derive(Debug, Error)]
pub enum GitProcessError {
    #[error("failed to spawn \"{command}\" in \"{}\": {source}", directory.display())]
    Spawn {
        command: String,
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Signal-terminated processes report an exit code of `-1`.
    #[error(
        "execution of \"{command}\" in \"{}\" failed with exit code {code}: {diagnostic}",
        directory.display()
    )]
    Failed {
        command: String,
        directory: PathBuf,
        code: i32,
        diagnostic: String,
    },
}

impl GitProcessError {
    /// Exit code of the failed process, if it ran at all.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Spawn { .. } => None,
            Self::Failed { code, .. } => Some(*code),
        }
    }
}

/// Handle on the configured git executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Git {
    binary: String,
}

impl Default for Git {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_BINARY)
    }
}

impl Git {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Runs `git <args>` inside `directory` and returns its trimmed standard output.
    pub fn run(&self, directory: &Path, args: &[&str]) -> Result<String, GitProcessError> {
        let command = self.describe(args);
        debug!(directory = %directory.display(), "> {command}");

        let output = Command::new(&self.binary)
            .current_dir(directory)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| GitProcessError::Spawn {
                command: command.clone(),
                directory: directory.to_path_buf(),
                source,
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };

        Err(GitProcessError::Failed {
            command,
            directory: directory.to_path_buf(),
            code: output.status.code().unwrap_or(-1),
            diagnostic,
        })
    }

    /// Like [`Git::run`], but a failing invocation means "absent".
    ///
    /// Used for lookups whose non-zero exit is an expected answer, such as
    /// `git config --get` on an unset key.
    pub fn run_optional(&self, directory: &Path, args: &[&str]) -> Option<String> {
        match self.run(directory, args) {
            Ok(output) => Some(output),
            Err(error) => {
                trace!(directory = %directory.display(), %error, "treating failure as absent");
                None
            }
        }
    }

    /// Reads a git config value, treating unset and blank values alike.
    pub fn config_value(&self, directory: &Path, scope: ConfigScope, key: &str) -> Option<String> {
        let args: &[&str] = match scope {
            ConfigScope::Local => &["config", "--local", "--get", key],
            ConfigScope::Effective => &["config", "--get", key],
        };
        self.run_optional(directory, args)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn describe(&self, args: &[&str]) -> String {
        std::iter::once(self.binary.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which configuration files a lookup consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Only the repository's own `.git/config`.
    Local,
    /// The merged view git itself would use (system, global, local).
    Effective,
}
