//! Runs one worker per target on a bounded thread pool.

use anyhow::Context;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::activity::WorkerObserver;
use crate::config::Config;
use crate::git::Git;
use crate::logging::LoggingObserver;
use crate::model::RepositoryTarget;
use crate::output::{ProgressSink, StatusObserver};
use crate::worker::{Worker, WorkerOptions, WorkerReport};

pub struct Scheduler {
    config: Config,
    sink: Arc<ProgressSink>,
}

impl Scheduler {
    pub fn new(config: Config, sink: Arc<ProgressSink>) -> Self {
        Self { config, sink }
    }

    /// Runs every target with logging and status observers attached.
    ///
    /// Reports come back in the order of `targets`.
    pub fn run(&self, targets: &[RepositoryTarget]) -> anyhow::Result<Vec<WorkerReport>> {
        let status = StatusObserver::new(Arc::clone(&self.sink), self.config.show_status);
        self.run_with(targets, |_| {
            vec![
                Box::new(LoggingObserver) as Box<dyn WorkerObserver>,
                Box::new(status.clone()),
            ]
        })
    }

    /// Runs every target with the observers `observers` builds for it.
    ///
    /// One worker's failure never affects the others; it only shows up in its report.
    pub fn run_with<F>(
        &self,
        targets: &[RepositoryTarget],
        observers: F,
    ) -> anyhow::Result<Vec<WorkerReport>>
    where
        F: Fn(&RepositoryTarget) -> Vec<Box<dyn WorkerObserver>>,
    {
        let git = Git::new(self.config.git_binary.clone());
        let options = WorkerOptions::from(&self.config);

        let workers: Vec<Worker> = targets
            .iter()
            .map(|target| {
                let mut worker = Worker::new(target.clone(), git.clone(), options);
                for observer in observers(target) {
                    worker.register_observer(observer);
                }
                worker
            })
            .collect();

        let threads = self.config.threads.get().min(workers.len().max(1));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("git-fleet-worker-{index}"))
            .build()
            .context("failed to build the worker pool")?;

        info!(repositories = workers.len(), threads, "starting workers");
        Ok(pool.install(|| workers.into_par_iter().map(Worker::run).collect()))
    }
}
