//! Keeps a fleet of git working copies in sync with their remotes.
//!
//! For every configured repository a [`worker::Worker`]:
//! - Clones it when missing, or points `origin` at the configured URL
//! - Fetches the remotes its branches track, with pruning
//! - Reports added and deleted remote branches
//! - Computes ahead/behind and working-tree counters
//! - Fast-forwards or rebases every branch with an upstream, stashing local changes
//! - Restores the original HEAD and stash
//!
//! Workers run in parallel under a [`scheduler::Scheduler`] and report
//! through [`activity::WorkerObserver`]s.

pub mod activity;
pub mod config;
pub mod constants;
pub mod error;
pub mod git;
pub mod logging;
pub mod model;
pub mod output;
pub mod scheduler;
pub mod worker;
pub mod workspace;
