//! Application-wide constants.

/// Git executable used when neither `--git` nor `GIT_FLEET_GIT` is given.
pub const DEFAULT_GIT_BINARY: &str = "git";

/// Environment variable overriding the git executable.
pub const GIT_BINARY_ENV: &str = "GIT_FLEET_GIT";

/// Worker threads per available core; git work is mostly waiting on network and disk.
pub const THREADS_PER_CORE: usize = 2;

/// Progress bar tick interval in milliseconds.
/// Controls how often the spinner/bar animates.
pub const PROGRESS_TICK_MS: u64 = 80;

/// Git directory name used to detect repositories.
pub const GIT_DIR: &str = ".git";

/// Submodule manifest; its presence triggers submodule sync after an update.
pub const SUBMODULES_FILE: &str = ".gitmodules";

/// Message attached to the stash entry pushed before branches are updated.
pub const STASH_MESSAGE: &str = "Stash before git-fleet update";

/// The remote every managed repository is cloned from.
pub const ORIGIN: &str = "origin";

/// Prefix of local branch refs, stripped to obtain the remote branch name.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Default name used when a repository name cannot be determined from its URL or path.
pub const DEFAULT_REPO_NAME: &str = "repository";
