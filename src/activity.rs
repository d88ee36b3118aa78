//! Journal entries and the observer interface through which workers report progress.

use std::fmt;
use tracing::Level;

use crate::worker::Worker;

/// Something a worker did, with the severity it is surfaced at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Abort,
    CloneRepository,
    UpdateRemoteUrl,
    Stash,
    Unstash,
    ParseLocalBranches,
    ParseRemoteBranches,
    RemoteBranchAdded,
    RemoteBranchDeleted,
    DetermineUpstreams,
    DetermineStats,
    FetchRemotes,
    Checkout,
    UpToDate,
    SkipNoUpstream,
    SkipUpstreamDeleted,
    Rebase,
    RebaseAbort,
    Merge,
    MergeAbort,
    UpdateSubmodules,
    RestoreHead,
    ExceptionOccurred,
}

impl Action {
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::ExceptionOccurred => Level::ERROR,
            Self::Abort | Self::SkipUpstreamDeleted | Self::RebaseAbort | Self::MergeAbort => {
                Level::WARN
            }
            Self::CloneRepository
            | Self::Stash
            | Self::Unstash
            | Self::RemoteBranchAdded
            | Self::RemoteBranchDeleted
            | Self::Rebase
            | Self::Merge => Level::INFO,
            Self::UpdateRemoteUrl
            | Self::ParseLocalBranches
            | Self::ParseRemoteBranches
            | Self::DetermineUpstreams
            | Self::DetermineStats
            | Self::FetchRemotes
            | Self::Checkout
            | Self::UpToDate
            | Self::SkipNoUpstream
            | Self::UpdateSubmodules
            | Self::RestoreHead => Level::DEBUG,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Abort => "ABORT",
            Self::CloneRepository => "CLONE_REPOSITORY",
            Self::UpdateRemoteUrl => "UPDATE_REMOTE_URL",
            Self::Stash => "STASH",
            Self::Unstash => "UNSTASH",
            Self::ParseLocalBranches => "PARSE_LOCAL_BRANCHES",
            Self::ParseRemoteBranches => "PARSE_REMOTE_BRANCHES",
            Self::RemoteBranchAdded => "REMOTE_BRANCH_ADDED",
            Self::RemoteBranchDeleted => "REMOTE_BRANCH_DELETED",
            Self::DetermineUpstreams => "DETERMINE_UPSTREAMS",
            Self::DetermineStats => "DETERMINE_STATS",
            Self::FetchRemotes => "FETCH_REMOTES",
            Self::Checkout => "CHECKOUT",
            Self::UpToDate => "UP_TO_DATE",
            Self::SkipNoUpstream => "SKIP_NO_UPSTREAM",
            Self::SkipUpstreamDeleted => "SKIP_UPSTREAM_DELETED",
            Self::Rebase => "REBASE",
            Self::RebaseAbort => "REBASE_ABORT",
            Self::Merge => "MERGE",
            Self::MergeAbort => "MERGE_ABORT",
            Self::UpdateSubmodules => "UPDATE_SUBMODULES",
            Self::RestoreHead => "RESTORE_HEAD",
            Self::ExceptionOccurred => "EXCEPTION_OCCURRED",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    action: Action,
    message: String,
}

impl Activity {
    pub fn new(action: Action, message: impl Into<String>) -> Self {
        Self {
            action,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.action, self.message)
    }
}

/// Receives progress from a running [`Worker`].
///
/// Callbacks run synchronously on the worker's own thread, so implementations
/// must return quickly. Many workers call into clones of the same observer
/// concurrently; shared output must be locked by the observer.
pub trait WorkerObserver: Send {
    /// Called once before the first pipeline step.
    fn start(&self, _worker: &Worker) {}

    /// Called for every journaled activity, in execution order.
    fn activity(&self, _activity: &Activity, _worker: &Worker) {}

    /// Called exactly once when the pipeline finishes, failed or not.
    fn end(&self, _worker: &Worker) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpObserver;

impl WorkerObserver for NoOpObserver {}
