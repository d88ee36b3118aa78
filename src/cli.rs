use clap::{ArgAction, Parser};
use git_fleet::config::{self, Config, Verbosity};
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Keep a fleet of git working copies in sync with their remotes.
#[derive(Debug, Parser)]
#[command(name = "git-fleet", version, about)]
pub struct Args {
    /// Repositories to manage as `[[GROUP/]NAME=]URL`; every working copy in DIR when omitted
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Working directory holding the repositories
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Clone repositories that do not exist yet
    #[arg(short, long)]
    pub init: bool,

    /// Update local branches from their upstreams
    #[arg(short, long)]
    pub update: bool,

    /// Show ahead/behind and working-tree counters (default without -i/-u)
    #[arg(short, long)]
    pub stat: bool,

    /// Number of repositories processed in parallel
    #[arg(short, long, value_name = "N", conflicts_with = "no_threads")]
    pub threads: Option<NonZeroUsize>,

    /// Process one repository at a time
    #[arg(long)]
    pub no_threads: bool,

    /// Git executable [env: GIT_FLEET_GIT]
    #[arg(long, value_name = "BIN")]
    pub git: Option<String>,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print activities; repeat for git commands
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Do not report directories that belong to no target
    #[arg(long)]
    pub omit_superfluous_warnings: bool,
}

impl Args {
    pub fn to_config(&self) -> Config {
        let threads = if self.no_threads {
            NonZeroUsize::MIN
        } else {
            self.threads.unwrap_or_else(config::default_threads)
        };

        Config {
            verbosity: Verbosity::from_flags(self.quiet, self.verbose),
            git_binary: self.git.clone().unwrap_or_else(config::git_binary),
            threads,
            clone_if_not_exists: self.init,
            update_existing: self.update,
            show_status: self.stat || !(self.init || self.update),
            omit_superfluous_warnings: self.omit_superfluous_warnings,
        }
    }
}
