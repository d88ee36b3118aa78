//! Runtime configuration for verbosity, threading and pipeline options.

use std::num::NonZeroUsize;
use tracing::Level;

use crate::constants::{DEFAULT_GIT_BINARY, GIT_BINARY_ENV, THREADS_PER_CORE};

/// Runtime configuration derived from CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Controls the verbosity level of CLI output.
    pub verbosity: Verbosity,
    /// Git executable name or path.
    pub git_binary: String,
    /// Size of the worker pool.
    pub threads: NonZeroUsize,
    /// Clone targets whose directory is missing or empty.
    pub clone_if_not_exists: bool,
    /// Reconcile local branches with their upstreams.
    pub update_existing: bool,
    /// Show per-branch ahead/behind and working-tree counters.
    pub show_status: bool,
    /// Suppress the report of unmanaged directories.
    pub omit_superfluous_warnings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            git_binary: git_binary(),
            threads: default_threads(),
            clone_if_not_exists: false,
            update_existing: false,
            show_status: true,
            omit_superfluous_warnings: false,
        }
    }
}

impl Config {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }
}

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    VeryVerbose,
}

impl Verbosity {
    /// Maps `-q` and the number of `-v` flags onto a level.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::VeryVerbose,
        }
    }

    /// Most verbose activity severity surfaced at this level.
    #[must_use]
    pub fn max_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::INFO,
            Self::VeryVerbose => Level::DEBUG,
        }
    }
}

/// Returns the git executable.
///
/// Can be customized via the GIT_FLEET_GIT environment variable.
/// Falls back to `git` on the search path if not set or empty.
pub fn git_binary() -> String {
    std::env::var(GIT_BINARY_ENV)
        .ok()
        .filter(|binary| !binary.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GIT_BINARY.to_string())
}

/// Pool size proportional to the available parallelism.
pub fn default_threads() -> NonZeroUsize {
    std::thread::available_parallelism()
        .ok()
        .and_then(|cores| NonZeroUsize::new(cores.get().saturating_mul(THREADS_PER_CORE)))
        .unwrap_or(NonZeroUsize::MIN)
}
