// Per-repository update pipeline: clone, fetch, reconcile branches, report

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::activity::{Action, Activity, WorkerObserver};
use crate::config::Config;
use crate::constants::{GIT_DIR, HEADS_PREFIX, ORIGIN, STASH_MESSAGE, SUBMODULES_FILE};
use crate::error::WorkerError;
use crate::git::{ConfigScope, Git, GitProcessError};
use crate::model::{
    Head, RemoteBranches, RepositoryTarget, Stats, Update, Upstream, WorkingTreeChanges,
    diff_remote_branches, parse_local_branches, parse_remote_branches, parse_upstream_remotes,
};

/// Which mutating phases a worker may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerOptions {
    pub clone_if_not_exists: bool,
    pub update_existing: bool,
}

impl From<&Config> for WorkerOptions {
    fn from(config: &Config) -> Self {
        Self {
            clone_if_not_exists: config.clone_if_not_exists,
            update_existing: config.update_existing,
        }
    }
}

/// Everything a worker learned and did. Owned by one worker until `run` returns it.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub target: RepositoryTarget,
    pub journal: Vec<Activity>,
    /// `None` only for a repository without any commit.
    pub head: Option<Head>,
    pub local_branches: Vec<String>,
    pub remote_branches_before: RemoteBranches,
    pub remote_branches: RemoteBranches,
    pub added_remote_branches: RemoteBranches,
    pub deleted_remote_branches: RemoteBranches,
    pub branch_upstreams: BTreeMap<String, Upstream>,
    pub branch_updates: BTreeMap<String, Update>,
    pub branch_stats: BTreeMap<String, Stats>,
    pub freshly_cloned: bool,
    pub has_stashed: bool,
    pub succeed: bool,
    pub error: Option<String>,
    pub duration: Duration,
}

impl WorkerReport {
    /// Empty report for a worker that has not run yet.
    pub fn new(target: RepositoryTarget) -> Self {
        Self {
            target,
            journal: Vec::new(),
            head: None,
            local_branches: Vec::new(),
            remote_branches_before: RemoteBranches::new(),
            remote_branches: RemoteBranches::new(),
            added_remote_branches: RemoteBranches::new(),
            deleted_remote_branches: RemoteBranches::new(),
            branch_upstreams: BTreeMap::new(),
            branch_updates: BTreeMap::new(),
            branch_stats: BTreeMap::new(),
            freshly_cloned: false,
            has_stashed: false,
            succeed: false,
            error: None,
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Stopped early without an error, e.g. not cloned because cloning is disabled.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        !self.succeed && self.error.is_none()
    }

    /// Whether `action` was journaled.
    #[must_use]
    pub fn has_activity(&self, action: Action) -> bool {
        self.journal.iter().any(|activity| activity.action() == action)
    }
}

/// Runs the update pipeline for one repository.
///
/// A worker is built per target and run exactly once; `run` consumes it and
/// hands back the [`WorkerReport`].
pub struct Worker {
    git: Git,
    options: WorkerOptions,
    update_existing: bool,
    observers: Vec<Box<dyn WorkerObserver>>,
    report: WorkerReport,
}

impl Worker {
    pub fn new(target: RepositoryTarget, git: Git, options: WorkerOptions) -> Self {
        Self {
            git,
            options,
            update_existing: options.update_existing,
            observers: Vec::new(),
            report: WorkerReport::new(target),
        }
    }

    /// Observers are notified in registration order.
    pub fn register_observer(&mut self, observer: Box<dyn WorkerObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn target(&self) -> &RepositoryTarget {
        &self.report.target
    }

    #[must_use]
    pub fn report(&self) -> &WorkerReport {
        &self.report
    }

    pub fn run(mut self) -> WorkerReport {
        let started = Instant::now();

        for observer in &self.observers {
            observer.start(&self);
        }

        match self.execute() {
            Ok(completed) => self.report.succeed = completed,
            Err(err) => {
                let message = err.to_string();
                error!(
                    repo = %self.report.target.display_name(),
                    fatal = err.is_fatal(),
                    "{message}"
                );
                self.report
                    .journal
                    .push(Activity::new(Action::ExceptionOccurred, message.clone()));
                self.report.error = Some(message);
            }
        }

        self.report.duration = started.elapsed();

        for observer in &self.observers {
            observer.end(&self);
        }

        self.report
    }

    fn execute(&mut self) -> Result<bool, WorkerError> {
        if !self.clone_or_reconfigure()? {
            return Ok(false);
        }

        self.determine_head();
        self.report.remote_branches_before = self.determine_remote_branches()?;
        self.fetch_remotes()?;
        self.report.remote_branches = self.determine_remote_branches()?;
        self.calculate_remote_branch_changes();
        self.determine_local_branches_and_upstreams()?;
        self.determine_stats()?;

        if self.update_existing && self.report.head.is_some() {
            self.stash_changes()?;
            let updated = self.update_branches();
            let restored = self.restore_head();
            let unstashed = match &restored {
                Ok(()) => self.unstash_changes(),
                Err(_) if self.report.has_stashed => {
                    self.activity(
                        Action::Abort,
                        "stash kept, the original head could not be restored",
                    );
                    Ok(())
                }
                Err(_) => Ok(()),
            };
            updated.and(restored).and(unstashed)?;
        }

        Ok(true)
    }

    /// Clones a missing repository or makes sure an existing one points at the configured URL.
    ///
    /// Returns `false` when the repository is missing and cloning is disabled.
    fn clone_or_reconfigure(&mut self) -> Result<bool, WorkerError> {
        let directory = self.report.target.directory().to_path_buf();

        if directory.exists() {
            if !directory.is_dir() {
                return Err(WorkerError::NotADirectory(directory));
            }

            if directory.join(GIT_DIR).exists() {
                self.reconfigure_remote(&directory)?;
                return Ok(true);
            }

            let mut entries =
                fs::read_dir(&directory).map_err(|source| WorkerError::NotListable {
                    directory: directory.clone(),
                    source,
                })?;
            if entries.next().is_some() {
                return Err(WorkerError::Occupied(directory));
            }
        }

        if !self.options.clone_if_not_exists {
            self.activity(Action::Abort, "not cloned yet");
            return Ok(false);
        }

        self.clone_repository(&directory)?;
        Ok(true)
    }

    fn reconfigure_remote(&mut self, directory: &Path) -> Result<(), WorkerError> {
        let expected = self.report.target.url().to_string();
        let key = format!("remote.{ORIGIN}.url");

        match self.git.config_value(directory, ConfigScope::Local, &key) {
            Some(actual) if actual == expected => {}
            Some(_) => {
                self.activity(Action::UpdateRemoteUrl, "update remote url");
                self.git(&["remote", "set-url", ORIGIN, &expected])?;
            }
            None => {
                self.activity(Action::UpdateRemoteUrl, format!("add remote {ORIGIN}"));
                self.git(&["remote", "add", ORIGIN, &expected])?;
            }
        }
        Ok(())
    }

    fn clone_repository(&mut self, directory: &Path) -> Result<(), WorkerError> {
        let name = directory
            .file_name()
            .ok_or_else(|| WorkerError::NotADirectory(directory.to_path_buf()))?
            .to_string_lossy()
            .into_owned();
        let parent = directory
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        fs::create_dir_all(&parent).map_err(|source| WorkerError::CreateDirectory {
            directory: parent.clone(),
            source,
        })?;

        let url = self.report.target.url().to_string();
        self.activity(Action::CloneRepository, format!("clone {url}"));
        self.git.run(&parent, &["clone", &url, &name])?;
        self.activity(Action::UpdateSubmodules, "initialize submodules");
        self.git(&["submodule", "init"])?;
        self.git(&["submodule", "update"])?;

        self.report.freshly_cloned = true;
        self.update_existing = false;
        Ok(())
    }

    fn determine_head(&mut self) {
        let head = match self.git_optional(&["symbolic-ref", "--short", "HEAD"]) {
            Some(branch) => self
                .git_optional(&[
                    "rev-parse",
                    "--verify",
                    "--quiet",
                    &format!("{HEADS_PREFIX}{branch}"),
                ])
                .map(|commit| Head {
                    symbolic_ref: branch,
                    commit_ref: commit,
                }),
            None => self
                .git_optional(&["rev-parse", "--verify", "--quiet", "HEAD"])
                .map(|commit| Head {
                    symbolic_ref: commit.clone(),
                    commit_ref: commit,
                }),
        };

        match &head {
            Some(head) => debug!(
                repo = %self.report.target.display_name(),
                head = %head.symbolic_ref,
                "determined head"
            ),
            None => debug!(repo = %self.report.target.display_name(), "repository has no commits"),
        }
        self.report.head = head;
    }

    fn determine_remote_branches(&mut self) -> Result<RemoteBranches, WorkerError> {
        self.activity(Action::ParseRemoteBranches, "parse remote branches");
        Ok(parse_remote_branches(&self.git(&["branch", "-r"])?))
    }

    /// Fetches, with pruning, every remote that some local branch tracks.
    fn fetch_remotes(&mut self) -> Result<(), WorkerError> {
        let remotes = self
            .git_optional(&["config", "--local", "--get-regexp", r"^branch\..*\.remote$"])
            .map(|output| parse_upstream_remotes(&output))
            .unwrap_or_default();

        if remotes.is_empty() {
            self.activity(Action::FetchRemotes, "no tracked remotes to fetch");
            return Ok(());
        }

        self.activity(
            Action::FetchRemotes,
            format!("fetch remotes {}", remotes.join(", ")),
        );
        let mut args = vec!["fetch", "--prune", "--multiple"];
        args.extend(remotes.iter().map(String::as_str));
        self.git(&args)?;
        Ok(())
    }

    fn calculate_remote_branch_changes(&mut self) {
        let before = &self.report.remote_branches_before;
        let after = &self.report.remote_branches;
        let deleted = diff_remote_branches(before, after);
        let added = diff_remote_branches(after, before);

        for (remote, branches) in &deleted {
            for branch in branches {
                self.activity(
                    Action::RemoteBranchDeleted,
                    format!("remote branch {remote}/{branch} was deleted"),
                );
            }
        }
        for (remote, branches) in &added {
            for branch in branches {
                self.activity(
                    Action::RemoteBranchAdded,
                    format!("remote branch {remote}/{branch} was added"),
                );
            }
        }

        self.report.deleted_remote_branches = deleted;
        self.report.added_remote_branches = added;
    }

    fn determine_local_branches_and_upstreams(&mut self) -> Result<(), WorkerError> {
        self.activity(Action::ParseLocalBranches, "parse local branches");
        let output = self.git(&["for-each-ref", "--format=%(refname)", "refs/heads"])?;
        self.report.local_branches = parse_local_branches(&output);

        self.activity(Action::DetermineUpstreams, "determine branch upstreams");
        let directory = self.report.target.directory().to_path_buf();
        let global_rebase = self
            .git
            .config_value(&directory, ConfigScope::Effective, "pull.rebase");

        for branch in &self.report.local_branches {
            let config = |key: &str| {
                self.git
                    .config_value(&directory, ConfigScope::Local, &format!("branch.{branch}.{key}"))
            };

            let (Some(remote), Some(merge)) = (config("remote"), config("merge")) else {
                continue;
            };
            let rebase = config("rebase")
                .or_else(|| global_rebase.clone())
                .is_some_and(|value| value.eq_ignore_ascii_case("true"));

            if let Some(upstream) = Upstream::from_config(&remote, &merge, rebase) {
                self.report.branch_upstreams.insert(branch.clone(), upstream);
            }
        }
        Ok(())
    }

    /// Ahead/behind for every branch with a present upstream; working-tree counters for HEAD.
    fn determine_stats(&mut self) -> Result<(), WorkerError> {
        self.activity(Action::DetermineStats, "determine branch stats");
        let head_branch = self
            .report
            .head
            .as_ref()
            .and_then(Head::branch)
            .map(str::to_string);

        for branch in self.report.local_branches.clone() {
            let upstream = self
                .report
                .branch_upstreams
                .get(&branch)
                .filter(|upstream| upstream.is_available_in(&self.report.remote_branches))
                .cloned();
            let is_head = head_branch.as_deref() == Some(branch.as_str());

            if upstream.is_none() && !is_head {
                continue;
            }

            let (ahead, behind) = match &upstream {
                Some(upstream) => self.count_divergence(&branch, upstream)?,
                None => (0, 0),
            };
            let changes = if is_head {
                WorkingTreeChanges::from_porcelain(&self.git(&["status", "--porcelain"])?)
            } else {
                WorkingTreeChanges::default()
            };

            self.report
                .branch_stats
                .insert(branch, Stats::new(ahead, behind, changes));
        }
        Ok(())
    }

    /// Returns `(ahead, behind)` of `branch` relative to its upstream.
    fn count_divergence(
        &self,
        branch: &str,
        upstream: &Upstream,
    ) -> Result<(usize, usize), WorkerError> {
        let local = self.rev_parse(&format!("{HEADS_PREFIX}{branch}"))?;
        let remote = self.rev_parse(&tracking_ref(upstream))?;

        let behind = self.count_commits(&format!("{local}..{remote}"))?;
        let ahead = self.count_commits(&format!("{remote}..{local}"))?;
        Ok((ahead, behind))
    }

    fn count_commits(&self, range: &str) -> Result<usize, WorkerError> {
        let output = self.git(&["rev-list", "--count", range])?;
        let count = output.trim().parse::<usize>();
        count.map_err(|_| WorkerError::UnexpectedOutput {
            command: format!("rev-list --count {range}"),
            output,
        })
    }

    fn stash_changes(&mut self) -> Result<(), WorkerError> {
        let status = self.git(&["status", "--porcelain", "--ignore-submodules"])?;
        if status.is_empty() {
            return Ok(());
        }

        self.activity(Action::Stash, "stash changes");
        let output = self.git(&[
            "stash",
            "push",
            "--include-untracked",
            "--message",
            STASH_MESSAGE,
        ])?;
        self.report.has_stashed = !output.contains("No local changes to save");
        Ok(())
    }

    fn unstash_changes(&mut self) -> Result<(), WorkerError> {
        if !self.report.has_stashed {
            return Ok(());
        }

        self.activity(Action::Unstash, "apply stash");
        self.git(&["stash", "pop"])?;
        Ok(())
    }

    fn update_branches(&mut self) -> Result<(), WorkerError> {
        for branch in self.report.local_branches.clone() {
            let update = self.update_branch(&branch)?;
            self.report.branch_updates.insert(branch, update);

            let reconciled = matches!(update, Update::MergedFastForward | Update::Rebased);
            if reconciled && self.has_submodules() {
                self.update_submodules()?;
            }
        }
        Ok(())
    }

    fn update_submodules(&mut self) -> Result<(), WorkerError> {
        self.activity(Action::UpdateSubmodules, "update submodules");
        self.git(&["submodule", "sync"])?;
        self.git(&["submodule", "update", "--init"])?;
        Ok(())
    }

    fn update_branch(&mut self, branch: &str) -> Result<Update, WorkerError> {
        let Some(upstream) = self.report.branch_upstreams.get(branch).cloned() else {
            self.activity(
                Action::SkipNoUpstream,
                format!("skip {branch}, no upstream configured"),
            );
            return Ok(Update::SkipNoUpstream);
        };

        if !upstream.is_available_in(&self.report.remote_branches) {
            self.activity(
                Action::SkipUpstreamDeleted,
                format!("skip {branch}, upstream {} is gone", upstream.remote_ref()),
            );
            return Ok(Update::SkipUpstreamDeleted);
        }

        self.activity(Action::Checkout, format!("checkout branch {branch}"));
        self.git(&["checkout", "--quiet", branch])?;

        let local = self.rev_parse(&format!("{HEADS_PREFIX}{branch}"))?;
        let remote = self.rev_parse(&tracking_ref(&upstream))?;
        if local == remote {
            self.activity(Action::UpToDate, format!("{branch} is up to date"));
            return Ok(Update::UpToDate);
        }

        if upstream.is_rebase() {
            self.rebase(&upstream)
        } else {
            self.merge_fast_forward(&upstream)
        }
    }

    fn rebase(&mut self, upstream: &Upstream) -> Result<Update, WorkerError> {
        self.activity(Action::Rebase, format!("rebase onto {}", upstream.remote_ref()));

        match self.git(&["rebase", upstream.remote_ref()]) {
            Ok(_) => Ok(Update::Rebased),
            Err(err) => {
                debug!(repo = %self.report.target.display_name(), %err, "rebase failed");
                self.activity(Action::RebaseAbort, "rebase aborted");
                if self.rebase_in_progress() {
                    self.git(&["rebase", "--abort"])?;
                }
                Ok(Update::SkipConflicting)
            }
        }
    }

    fn merge_fast_forward(&mut self, upstream: &Upstream) -> Result<Update, WorkerError> {
        self.activity(Action::Merge, format!("merge branch {}", upstream.remote_ref()));

        match self.git(&["merge", "--ff-only", upstream.remote_ref()]) {
            Ok(_) => Ok(Update::MergedFastForward),
            Err(err) => {
                debug!(repo = %self.report.target.display_name(), %err, "fast-forward failed");
                self.activity(Action::MergeAbort, "merge aborted");
                if self.merge_in_progress() {
                    self.git(&["merge", "--abort"])?;
                }
                Ok(Update::SkipConflicting)
            }
        }
    }

    fn restore_head(&mut self) -> Result<(), WorkerError> {
        let Some(head) = self.report.head.clone() else {
            return Ok(());
        };

        self.activity(Action::RestoreHead, format!("restore {}", head.symbolic_ref));
        self.git(&["checkout", "--quiet", &head.symbolic_ref])?;
        Ok(())
    }

    fn merge_in_progress(&self) -> bool {
        self.git_optional(&["rev-parse", "--quiet", "--verify", "MERGE_HEAD"])
            .is_some()
    }

    fn rebase_in_progress(&self) -> bool {
        ["rebase-merge", "rebase-apply"].into_iter().any(|state| {
            self.git_optional(&["rev-parse", "--git-path", state])
                .is_some_and(|path| self.report.target.directory().join(path).exists())
        })
    }

    fn has_submodules(&self) -> bool {
        self.report
            .target
            .directory()
            .join(SUBMODULES_FILE)
            .is_file()
    }

    fn rev_parse(&self, rev: &str) -> Result<String, WorkerError> {
        Ok(self.git(&["rev-parse", "--verify", rev])?)
    }

    /// Journals an activity and forwards it to every observer.
    fn activity(&mut self, action: Action, message: impl Into<String>) {
        self.report.journal.push(Activity::new(action, message));

        if let Some(activity) = self.report.journal.last() {
            for observer in &self.observers {
                observer.activity(activity, self);
            }
        }
    }

    fn git(&self, args: &[&str]) -> Result<String, GitProcessError> {
        self.git.run(self.report.target.directory(), args)
    }

    fn git_optional(&self, args: &[&str]) -> Option<String> {
        self.git.run_optional(self.report.target.directory(), args)
    }
}

/// Full ref of the remote-tracking branch, unambiguous even when a local branch shares its short name.
fn tracking_ref(upstream: &Upstream) -> String {
    format!("refs/remotes/{}", upstream.remote_ref())
}
