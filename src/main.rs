mod cli;

use anyhow::Context;
use clap::Parser;
use git_fleet::git::Git;
use git_fleet::scheduler::Scheduler;
use git_fleet::worker::WorkerReport;
use git_fleet::{logging, output, workspace};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Args::parse();
    let config = args.to_config();

    let base = match &args.directory {
        Some(directory) => directory.clone(),
        None => std::env::current_dir().context("failed to determine the working directory")?,
    };

    let sink = Arc::new(output::ProgressSink::for_config(&config));
    logging::init_logging(config.verbosity, Arc::clone(&sink))?;

    output::print_working_dir(&sink, &base, &config);

    let discovery = args.targets.is_empty();
    let targets = if discovery {
        workspace::discover_targets(&base, &Git::new(config.git_binary.clone()))
    } else {
        args.targets
            .iter()
            .map(|spec| workspace::parse_target(spec, &base))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    output::print_start(&sink, targets.len(), &config);
    sink.set_total(targets.len());

    let started = Instant::now();
    let reports = Scheduler::new(config.clone(), Arc::clone(&sink)).run(&targets)?;
    sink.finish();

    if !discovery && !config.omit_superfluous_warnings && base.is_dir() {
        match workspace::find_superfluous_dirs(&base, &targets) {
            Ok(directories) => output::print_superfluous(&sink, &directories),
            Err(err) => warn!("{err:#}"),
        }
    }

    output::print_summary(&sink, &reports, started.elapsed(), &config);

    if reports.iter().any(WorkerReport::is_failed) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
