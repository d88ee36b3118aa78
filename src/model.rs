// Repository targets, branch upstreams, stats and update outcomes

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::constants::HEADS_PREFIX;

/// How a repository's branches are reconciled with their upstreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Track every local branch's configured upstream, then return to the original HEAD.
    #[default]
    Head,
}

/// One managed repository. Identity is the resolved directory.
#[derive(Debug, Clone)]
pub struct RepositoryTarget {
    name: String,
    path: Option<String>,
    url: String,
    directory: PathBuf,
    strategy: Strategy,
}

impl RepositoryTarget {
    /// Resolves the directory as `base[/path]/name`.
    pub fn new(
        name: impl Into<String>,
        path: Option<String>,
        url: impl Into<String>,
        base: &Path,
    ) -> Self {
        let name = name.into();
        let mut directory = base.to_path_buf();
        if let Some(group) = path.as_deref().filter(|group| !group.is_empty()) {
            directory.push(group);
        }
        directory.push(&name);
        Self::with_directory(name, path, url, directory)
    }

    pub fn with_directory(
        name: impl Into<String>,
        path: Option<String>,
        url: impl Into<String>,
        directory: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.filter(|group| !group.is_empty()),
            url: url.into(),
            directory,
            strategy: Strategy::Head,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// `group/name`, or just `name` for ungrouped targets.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(group) => format!("{group}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl PartialEq for RepositoryTarget {
    fn eq(&self, other: &Self) -> bool {
        self.directory == other.directory
    }
}

impl Eq for RepositoryTarget {}

impl Hash for RepositoryTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.directory.hash(state);
    }
}

/// Where HEAD pointed when the worker started.
///
/// For a detached HEAD both fields hold the commit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub symbolic_ref: String,
    pub commit_ref: String,
}

impl Head {
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.symbolic_ref == self.commit_ref
    }

    /// The branch name, unless detached.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        (!self.is_detached()).then_some(self.symbolic_ref.as_str())
    }
}

/// The remote-tracking branch a local branch reconciles against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    remote_name: String,
    remote_branch: Option<String>,
    remote_ref: String,
    rebase: bool,
}

impl Upstream {
    /// Builds an upstream from `branch.<name>.remote` and `branch.<name>.merge`.
    ///
    /// Returns `None` unless both values are non-empty.
    pub fn from_config(remote_name: &str, merge_ref: &str, rebase: bool) -> Option<Self> {
        if remote_name.is_empty() || merge_ref.is_empty() {
            return None;
        }

        let (remote_branch, remote_ref) = match merge_ref.strip_prefix(HEADS_PREFIX) {
            Some(branch) => (
                Some(branch.to_string()),
                format!("{remote_name}/{branch}"),
            ),
            None => (None, format!("{remote_name}/{merge_ref}")),
        };

        Some(Self {
            remote_name: remote_name.to_string(),
            remote_branch,
            remote_ref,
            rebase,
        })
    }

    #[must_use]
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Short branch name on the remote; `None` when the merge ref is not a head.
    #[must_use]
    pub fn remote_branch(&self) -> Option<&str> {
        self.remote_branch.as_deref()
    }

    #[must_use]
    pub fn remote_ref(&self) -> &str {
        &self.remote_ref
    }

    #[must_use]
    pub fn is_rebase(&self) -> bool {
        self.rebase
    }

    /// Whether the upstream branch is listed in `remote_branches`.
    #[must_use]
    pub fn is_available_in(&self, remote_branches: &RemoteBranches) -> bool {
        let Some(branch) = self.remote_branch.as_deref() else {
            return false;
        };
        remote_branches
            .get(&self.remote_name)
            .is_some_and(|branches| branches.iter().any(|candidate| candidate == branch))
    }
}

/// Remote name to sorted branch names.
pub type RemoteBranches = BTreeMap<String, Vec<String>>;

/// Counters parsed from `git status --porcelain`, index and working-tree columns combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkingTreeChanges {
    pub added: usize,
    pub modified: usize,
    pub renamed: usize,
    pub copied: usize,
    pub deleted: usize,
    pub unmerged: usize,
}

impl WorkingTreeChanges {
    pub fn from_porcelain(status: &str) -> Self {
        status
            .lines()
            .filter(|line| line.len() >= 2)
            .flat_map(|line| line.chars().take(2))
            .fold(Self::default(), |mut changes, column| {
                match column {
                    'A' => changes.added += 1,
                    'M' => changes.modified += 1,
                    'R' => changes.renamed += 1,
                    'C' => changes.copied += 1,
                    'D' => changes.deleted += 1,
                    'U' => changes.unmerged += 1,
                    _ => {}
                }
                changes
            })
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    /// Staged or unstaged changes, conflicts excluded.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.added + self.modified + self.renamed + self.copied + self.deleted
    }
}

/// Ahead/behind counts for a branch, plus working-tree changes for the branch that was HEAD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    commits_ahead: usize,
    commits_behind: usize,
    changes: WorkingTreeChanges,
}

impl Stats {
    #[must_use]
    pub fn new(commits_ahead: usize, commits_behind: usize, changes: WorkingTreeChanges) -> Self {
        Self {
            commits_ahead,
            commits_behind,
            changes,
        }
    }

    #[must_use]
    pub fn commits_ahead(&self) -> usize {
        self.commits_ahead
    }

    #[must_use]
    pub fn commits_behind(&self) -> usize {
        self.commits_behind
    }

    #[must_use]
    pub fn changes(&self) -> &WorkingTreeChanges {
        &self.changes
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.changes.is_clean()
    }

    /// Clean and level with the upstream.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits_ahead == 0 && self.commits_behind == 0 && self.is_clean()
    }
}

/// Outcome of reconciling one local branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Update {
    SkipNoUpstream,
    SkipUpstreamDeleted,
    UpToDate,
    MergedFastForward,
    Rebased,
    SkipConflicting,
}

impl Update {
    #[must_use]
    pub fn is_skip(self) -> bool {
        matches!(
            self,
            Self::SkipNoUpstream | Self::SkipUpstreamDeleted | Self::SkipConflicting
        )
    }

    /// Short label used in status output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::SkipNoUpstream => "no upstream",
            Self::SkipUpstreamDeleted => "upstream deleted",
            Self::UpToDate => "up to date",
            Self::MergedFastForward => "updated",
            Self::Rebased => "rebased",
            Self::SkipConflicting => "conflicting",
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses `git for-each-ref --format=%(refname) refs/heads` output into sorted branch names.
pub fn parse_local_branches(output: &str) -> Vec<String> {
    let mut branches: Vec<String> = output
        .lines()
        .map(str::trim)
        .map(|line| line.strip_prefix(HEADS_PREFIX).unwrap_or(line).to_string())
        .filter(|branch| !branch.is_empty())
        .collect();
    branches.sort();
    branches.dedup();
    branches
}

/// Parses `git branch -r` output into remote name to branch names.
pub fn parse_remote_branches(output: &str) -> RemoteBranches {
    let mut remotes = RemoteBranches::new();
    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.contains(" -> ") {
            continue;
        }
        if let Some((remote, branch)) = line.split_once('/') {
            remotes
                .entry(remote.to_string())
                .or_default()
                .push(branch.to_string());
        }
    }
    for branches in remotes.values_mut() {
        branches.sort();
    }
    remotes
}

/// Branches present in `from` but not in `to`, per remote. Remotes missing from `to` lose all branches.
pub fn diff_remote_branches(from: &RemoteBranches, to: &RemoteBranches) -> RemoteBranches {
    from.iter()
        .filter_map(|(remote, branches)| {
            let missing: Vec<String> = match to.get(remote) {
                None => branches.clone(),
                Some(remaining) => branches
                    .iter()
                    .filter(|branch| !remaining.contains(branch))
                    .cloned()
                    .collect(),
            };
            (!missing.is_empty()).then(|| (remote.clone(), missing))
        })
        .collect()
}

/// Parses the remote names out of `git config --get-regexp ^branch\..*\.remote$`.
///
/// The local pseudo-remote `.` is dropped; it is never fetched.
pub fn parse_upstream_remotes(output: &str) -> Vec<String> {
    let mut remotes: Vec<String> = output
        .lines()
        .filter_map(|line| line.split_once(' '))
        .map(|(_, remote)| remote.trim().to_string())
        .filter(|remote| !remote.is_empty() && remote != ".")
        .collect();
    remotes.sort();
    remotes.dedup();
    remotes
}
