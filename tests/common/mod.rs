//! Test infrastructure for git-fleet integration tests.
#![allow(dead_code)]

use anyhow::Result;
use git_fleet::git::Git;
use git_fleet::model::RepositoryTarget;
use git_fleet::worker::{Worker, WorkerOptions, WorkerReport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> Result<String> {
    Ok(Git::default().run(dir, args)?)
}

/// Sets a committer identity and disables signing so commits work on any machine.
pub fn configure_identity(dir: &Path) -> Result<()> {
    git(dir, &["config", "user.email", "test@example.com"])?;
    git(dir, &["config", "user.name", "Test User"])?;
    git(dir, &["config", "commit.gpgsign", "false"])?;
    Ok(())
}

/// A bare remote, a seed clone that publishes to it, and a workspace for managed clones.
/// Automatically cleaned up when dropped.
pub struct Fixture {
    _temp_dir: TempDir,
    remote: PathBuf,
    seed: PathBuf,
    workspace: PathBuf,
}

impl Fixture {
    /// Creates the remote with one commit on `main`.
    pub fn new() -> Result<Self> {
        let fixture = Self::empty()?;
        fixture.publish("README.md", "# Fleet\n", "Initial commit")?;
        git(&fixture.seed, &["push", "--quiet", "-u", "origin", "main"])?;
        Ok(fixture)
    }

    /// Creates a remote without any commit.
    pub fn empty() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let remote = root.join("remote.git");
        let seed = root.join("seed");
        let workspace = root.join("workspace");
        std::fs::create_dir_all(&workspace)?;

        git(&root, &["init", "--quiet", "--bare", "-b", "main", "remote.git"])?;
        git(&root, &["init", "--quiet", "-b", "main", "seed"])?;
        configure_identity(&seed)?;
        git(&seed, &["remote", "add", "origin", &path_str(&remote)])?;

        Ok(Self {
            _temp_dir: temp_dir,
            remote,
            seed,
            workspace,
        })
    }

    pub fn url(&self) -> String {
        path_str(&self.remote)
    }

    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }

    pub fn seed(&self) -> &Path {
        &self.seed
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn target(&self, name: &str) -> RepositoryTarget {
        RepositoryTarget::new(name, None, self.url(), &self.workspace)
    }

    /// Clones the remote into the workspace the way a user would have.
    pub fn clone_as(&self, name: &str) -> Result<PathBuf> {
        git(&self.workspace, &["clone", "--quiet", &self.url(), name])?;
        let path = self.workspace.join(name);
        configure_identity(&path)?;
        git(&path, &["config", "branch.main.rebase", "false"])?;
        Ok(path)
    }

    /// Commits a file in the seed on its current branch without pushing.
    pub fn publish(&self, file: &str, content: &str, message: &str) -> Result<String> {
        commit(&self.seed, file, content, message)
    }

    /// Commits in the seed on `branch` and pushes it.
    pub fn push_commit(&self, branch: &str, file: &str, content: &str) -> Result<String> {
        let head = format!("refs/heads/{branch}");
        let exists = Git::default()
            .run_optional(&self.seed, &["rev-parse", "--verify", "--quiet", &head])
            .is_some();
        if exists {
            git(&self.seed, &["checkout", "--quiet", branch])?;
        } else {
            git(&self.seed, &["checkout", "--quiet", "-b", branch])?;
        }
        let commit = commit(&self.seed, file, content, &format!("Update {file} on {branch}"))?;
        git(&self.seed, &["push", "--quiet", "origin", branch])?;
        git(&self.seed, &["checkout", "--quiet", "main"])?;
        Ok(commit)
    }

    pub fn delete_remote_branch(&self, branch: &str) -> Result<()> {
        git(&self.seed, &["push", "--quiet", "origin", "--delete", branch])?;
        Ok(())
    }

    /// Creates another bare remote `<name>.git` with one commit and returns its url.
    pub fn create_library(&self, name: &str) -> Result<String> {
        let root = self.root();
        let bare = format!("{name}.git");
        let work = root.join(format!("{name}-seed"));
        git(root, &["init", "--quiet", "--bare", "-b", "main", &bare])?;
        git(root, &["init", "--quiet", "-b", "main", &path_str(&work)])?;
        configure_identity(&work)?;
        commit(&work, &format!("{name}.txt"), name, "Initial library commit")?;
        let url = path_str(&root.join(&bare));
        git(&work, &["push", "--quiet", &url, "main"])?;
        Ok(url)
    }

    /// Adds `library_url` as a submodule at `path` on `main` and pushes it.
    ///
    /// With `recorded_url`, `.gitmodules` points there instead of the real library.
    pub fn push_submodule(
        &self,
        library_url: &str,
        path: &str,
        recorded_url: Option<&str>,
    ) -> Result<String> {
        git(
            &self.seed,
            &[
                "-c",
                "protocol.file.allow=always",
                "submodule",
                "add",
                "--quiet",
                library_url,
                path,
            ],
        )?;
        if let Some(url) = recorded_url {
            let key = format!("submodule.{path}.url");
            git(&self.seed, &["config", "-f", ".gitmodules", &key, url])?;
            git(&self.seed, &["add", ".gitmodules"])?;
        }
        git(&self.seed, &["commit", "--quiet", "-m", &format!("Add submodule {path}")])?;
        git(&self.seed, &["push", "--quiet", "origin", "main"])?;
        rev_parse(&self.seed, "HEAD")
    }
}

pub fn commit(dir: &Path, file: &str, content: &str, message: &str) -> Result<String> {
    std::fs::write(dir.join(file), content)?;
    git(dir, &["add", file])?;
    git(dir, &["commit", "--quiet", "-m", message])?;
    rev_parse(dir, "HEAD")
}

pub fn rev_parse(dir: &Path, rev: &str) -> Result<String> {
    git(dir, &["rev-parse", "--verify", rev])
}

pub fn current_branch(dir: &Path) -> Option<String> {
    Git::default().run_optional(dir, &["symbolic-ref", "--short", "HEAD"])
}

pub fn stash_count(dir: &Path) -> Result<usize> {
    Ok(git(dir, &["stash", "list"])?.lines().count())
}

pub fn is_ancestor(dir: &Path, ancestor: &str, descendant: &str) -> bool {
    Git::default()
        .run_optional(dir, &["merge-base", "--is-ancestor", ancestor, descendant])
        .is_some()
}

/// A git wrapper script that allows local file transport for submodule clones.
#[cfg(unix)]
pub fn git_allowing_file_transport(dir: &Path) -> Result<Git> {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("git-file-transport");
    std::fs::write(&script, "#!/bin/sh\nexec git -c protocol.file.allow=always \"$@\"\n")?;
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    Ok(Git::new(path_str(&script)))
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn update_options() -> WorkerOptions {
    WorkerOptions {
        clone_if_not_exists: true,
        update_existing: true,
    }
}

pub fn run_worker(target: RepositoryTarget, options: WorkerOptions) -> WorkerReport {
    Worker::new(target, Git::default(), options).run()
}

/// Thread-safe in-memory writer for asserting on sink output.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
