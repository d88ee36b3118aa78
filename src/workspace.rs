// Target specifications, repository discovery and unmanaged directories

use anyhow::{Context, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{DEFAULT_REPO_NAME, GIT_DIR, ORIGIN};
use crate::git::{ConfigScope, Git};
use crate::model::RepositoryTarget;

pub fn is_git_repo(path: &Path) -> bool {
    path.join(GIT_DIR).exists()
}

/// Direct children of `path` that are git working copies, sorted.
pub fn find_git_repos(path: &Path) -> Vec<PathBuf> {
    let mut repos: Vec<PathBuf> = fs::read_dir(path)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && is_git_repo(p))
        .collect();
    repos.sort();
    repos
}

/// Parses `[[GROUP/]NAME=]URL` relative to `base`.
///
/// Without a name, the last URL segment minus `.git` is used.
pub fn parse_target(spec: &str, base: &Path) -> anyhow::Result<RepositoryTarget> {
    let spec = spec.trim();

    let (label, url) = match spec.split_once('=') {
        Some((label, url)) if !label.contains(':') => (Some(label.trim()), url.trim()),
        _ => (None, spec),
    };
    if url.is_empty() {
        bail!("missing repository url in \"{spec}\"");
    }

    let (group, name) = match label {
        Some(label) => match label.rsplit_once('/') {
            Some((group, name)) => (Some(group.trim_matches('/').to_string()), name.to_string()),
            None => (None, label.to_string()),
        },
        None => (None, repo_name_from_url(url)),
    };
    if name.is_empty() || name == "." || name == ".." {
        bail!("invalid repository name in \"{spec}\"");
    }

    Ok(RepositoryTarget::new(name, group, url, base))
}

/// Last path segment of a clone URL without the `.git` suffix.
pub fn repo_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let segment = trimmed
        .rsplit(['/', ':', '\\'])
        .next()
        .unwrap_or(trimmed);
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    if name.is_empty() {
        DEFAULT_REPO_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// One target per working copy under `base` that has an origin remote.
pub fn discover_targets(base: &Path, git: &Git) -> Vec<RepositoryTarget> {
    let key = format!("remote.{ORIGIN}.url");

    find_git_repos(base)
        .into_iter()
        .filter_map(|directory| {
            let Some(url) = git.config_value(&directory, ConfigScope::Local, &key) else {
                warn!(directory = %directory.display(), "skipping repository without {ORIGIN} remote");
                return None;
            };
            let name = directory.file_name()?.to_string_lossy().into_owned();
            debug!(%name, %url, "discovered repository");
            Some(RepositoryTarget::with_directory(name, None, url, directory))
        })
        .collect()
}

/// Visible directories under `base` that neither are nor contain a target.
pub fn find_superfluous_dirs(
    base: &Path,
    targets: &[RepositoryTarget],
) -> anyhow::Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(base).with_context(|| format!("failed to list \"{}\"", base.display()))?;

    let mut superfluous: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            !p.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'))
        })
        .filter(|p| !targets.iter().any(|target| target.directory().starts_with(p)))
        .collect();
    superfluous.sort();
    Ok(superfluous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_target_with_group_and_name() -> anyhow::Result<()> {
        let target = parse_target("libs/core=https://example.com/org/core-lib.git", Path::new("/w"))?;
        assert_eq!(target.name(), "core");
        assert_eq!(target.path(), Some("libs"));
        assert_eq!(target.url(), "https://example.com/org/core-lib.git");
        assert_eq!(target.directory(), Path::new("/w/libs/core"));
        Ok(())
    }

    #[test]
    fn test_parse_target_with_name_only() -> anyhow::Result<()> {
        let target = parse_target("api=git@example.com:org/api-server.git", Path::new("/w"))?;
        assert_eq!(target.name(), "api");
        assert_eq!(target.path(), None);
        assert_eq!(target.directory(), Path::new("/w/api"));
        Ok(())
    }

    #[test]
    fn test_parse_target_derives_name_from_url() -> anyhow::Result<()> {
        let ssh = parse_target("git@example.com:org/tools.git", Path::new("/w"))?;
        assert_eq!(ssh.name(), "tools");

        let https = parse_target("https://example.com/org/web/", Path::new("/w"))?;
        assert_eq!(https.name(), "web");
        assert_eq!(https.url(), "https://example.com/org/web/");
        Ok(())
    }

    #[test]
    fn test_parse_target_keeps_equals_inside_url() -> anyhow::Result<()> {
        let target = parse_target("https://example.com/repo.git?ref=main", Path::new("/w"))?;
        assert_eq!(target.url(), "https://example.com/repo.git?ref=main");
        Ok(())
    }

    #[test]
    fn test_parse_target_rejects_missing_url_or_name() {
        assert!(parse_target("name=", Path::new("/w")).is_err());
        assert!(parse_target("group/=https://example.com/x.git", Path::new("/w")).is_err());
    }

    #[test]
    fn test_repo_name_from_url_falls_back_for_empty_segment() {
        assert_eq!(repo_name_from_url("/"), DEFAULT_REPO_NAME);
        assert_eq!(repo_name_from_url("/srv/git/app.git"), "app");
    }

    #[test]
    fn test_find_git_repos_lists_only_working_copies() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        fs::create_dir_all(temp.path().join("b/.git"))?;
        fs::create_dir_all(temp.path().join("a/.git"))?;
        fs::create_dir_all(temp.path().join("plain"))?;
        fs::write(temp.path().join("file.txt"), "x")?;

        let repos = find_git_repos(temp.path());
        assert_eq!(repos, vec![temp.path().join("a"), temp.path().join("b")]);
        Ok(())
    }

    #[test]
    fn test_find_superfluous_dirs_ignores_targets_groups_and_hidden() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        for dir in ["api", "libs/core", "stray", ".cache"] {
            fs::create_dir_all(temp.path().join(dir))?;
        }
        fs::write(temp.path().join("notes.txt"), "x")?;

        let targets = vec![
            RepositoryTarget::new("api", None, "u", temp.path()),
            RepositoryTarget::new("core", Some("libs".to_string()), "u", temp.path()),
        ];
        let superfluous = find_superfluous_dirs(temp.path(), &targets)?;
        assert_eq!(superfluous, vec![temp.path().join("stray")]);
        Ok(())
    }
}
