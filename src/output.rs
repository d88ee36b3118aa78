//! Progress bars, colored output, and summary formatting.
//!
//! All output produced while workers run goes through one [`ProgressSink`].
//! The sink serializes writes behind a single mutex, so blocks and log lines
//! from different repositories never interleave.

use crate::activity::{Activity, WorkerObserver};
use crate::config::Config;
use crate::constants::PROGRESS_TICK_MS;
use crate::model::{RemoteBranches, Stats, Update};
use crate::worker::{Worker, WorkerReport};
use colored::{ColoredString, Colorize};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Where the sink draws.
enum Surface {
    /// Overall progress bar plus one spinner per running repository.
    Terminal {
        multi: MultiProgress,
        main_bar: ProgressBar,
    },
    /// Plain line output, e.g. stdout when not attached to a terminal.
    Writer(Box<dyn Write + Send>),
}

/// Consolidated state guarded by the sink's single lock.
struct SinkState {
    surface: Surface,
    active: HashMap<PathBuf, ProgressBar>,
    completed: usize,
    failed: usize,
}

impl SinkState {
    fn write_block(&mut self, text: &str) {
        match &mut self.surface {
            Surface::Terminal { multi, .. } => {
                let _ = multi.println(text);
            }
            Surface::Writer(writer) => {
                let _ = writeln!(writer, "{text}");
                let _ = writer.flush();
            }
        }
    }
}

/// Output port shared by every worker thread.
pub struct ProgressSink {
    state: Mutex<SinkState>,
}

impl ProgressSink {
    /// Progress bars on stderr, blocks printed above them.
    #[must_use]
    pub fn terminal() -> Self {
        let multi = MultiProgress::new();
        let main_bar = multi.add(ProgressBar::new(0));
        main_bar.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} completed {spinner:.cyan} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░"),
        );
        main_bar.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));

        Self::from_surface(Surface::Terminal { multi, main_bar })
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::with_writer(std::io::stdout())
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self::from_surface(Surface::Writer(Box::new(writer)))
    }

    /// Terminal surface for interactive normal runs; plain stdout in quiet or
    /// verbose mode, or when stderr is not a terminal.
    #[must_use]
    pub fn for_config(config: &Config) -> Self {
        if config.is_quiet() || config.is_verbose() || !std::io::stderr().is_terminal() {
            Self::stdout()
        } else {
            Self::terminal()
        }
    }

    fn from_surface(surface: Surface) -> Self {
        Self {
            state: Mutex::new(SinkState {
                surface,
                active: HashMap::new(),
                completed: 0,
                failed: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_total(&self, total: usize) {
        if let Surface::Terminal { main_bar, .. } = &self.lock().surface {
            main_bar.set_length(total as u64);
        }
    }

    /// Writes `text` (one or more lines) as a unit.
    pub fn println(&self, text: &str) {
        self.lock().write_block(text);
    }

    /// Opens a spinner for a repository that started.
    pub fn begin(&self, key: &Path, label: &str) {
        let mut state = self.lock();
        let Surface::Terminal { multi, .. } = &state.surface else {
            return;
        };

        let spinner = multi.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::with_template("  {spinner:.cyan} {prefix:.bold} {wide_msg:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        spinner.set_prefix(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        state.active.insert(key.to_path_buf(), spinner);
    }

    pub fn progress(&self, key: &Path, message: &str) {
        if let Some(spinner) = self.lock().active.get(key) {
            spinner.set_message(message.to_string());
        }
    }

    /// Closes the repository's spinner, counts it and writes its final block.
    pub fn complete(&self, key: &Path, success: bool, block: &str) {
        let mut state = self.lock();

        if let Some(spinner) = state.active.remove(key) {
            spinner.finish_and_clear();
            if let Surface::Terminal { multi, .. } = &state.surface {
                multi.remove(&spinner);
            }
        }

        state.completed += 1;
        if !success {
            state.failed += 1;
        }

        if let Surface::Terminal { main_bar, .. } = &state.surface {
            main_bar.inc(1);
            if state.failed > 0 {
                main_bar.set_message(format!("│ {} failed", state.failed).red().to_string());
            }
        }

        state.write_block(block);
    }

    pub fn finish(&self) {
        let mut state = self.lock();
        for (_, spinner) in state.active.drain() {
            spinner.finish_and_clear();
        }
        if let Surface::Terminal { main_bar, .. } = &state.surface {
            main_bar.finish_and_clear();
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.lock().failed
    }
}

/// Presentation observer: a spinner while the worker runs, a status block when it ends.
#[derive(Clone)]
pub struct StatusObserver {
    sink: Arc<ProgressSink>,
    show_status: bool,
}

impl StatusObserver {
    pub fn new(sink: Arc<ProgressSink>, show_status: bool) -> Self {
        Self { sink, show_status }
    }
}

impl WorkerObserver for StatusObserver {
    fn start(&self, worker: &Worker) {
        let target = worker.target();
        self.sink.begin(target.directory(), &target.display_name());
    }

    fn activity(&self, activity: &Activity, worker: &Worker) {
        self.sink
            .progress(worker.target().directory(), activity.message());
    }

    fn end(&self, worker: &Worker) {
        let report = worker.report();
        self.sink.complete(
            report.target.directory(),
            !report.is_failed(),
            &render_report(report, self.show_status),
        );
    }
}

/// Renders the status block of one repository.
pub fn render_report(report: &WorkerReport, show_status: bool) -> String {
    let mut lines = vec![format!(" * {}", report.target.display_name().bold())];

    if let Some(error) = &report.error {
        lines.push(format!("   {}", error.red()));
        return lines.join("\n");
    }

    if report.is_skipped() {
        let reason = report
            .journal
            .last()
            .map_or("skipped", |activity| activity.message());
        lines.push(format!("   {}", reason.yellow()));
        return lines.join("\n");
    }

    if report.freshly_cloned {
        lines.push(format!("   {}", "cloned".green()));
    }

    let head_branch = report.head.as_ref().and_then(|head| head.branch());
    if let Some(head) = report.head.as_ref().filter(|head| head.is_detached()) {
        let short = head.commit_ref.get(..7).unwrap_or(&head.commit_ref);
        lines.push(format!("   {}", format!("detached at {short}").yellow()));
    }

    for branch in &report.local_branches {
        let mut line = format!("   {}", branch.cyan());
        if head_branch == Some(branch.as_str()) {
            line.push_str(&" *".yellow().to_string());
        }
        if let Some(update) = report.branch_updates.get(branch) {
            line.push_str(&format!("  {}", format_update(*update)));
        }
        if show_status && let Some(stats) = report.branch_stats.get(branch) {
            line.push_str(&format_stats(stats));
        }
        lines.push(line);
    }

    lines.extend(format_remote_changes(&report.added_remote_branches, '+'));
    lines.extend(format_remote_changes(&report.deleted_remote_branches, '-'));

    if report.has_stashed {
        lines.push(format!("   {}", "stash restored".yellow()));
    }

    lines.join("\n")
}

fn format_update(update: Update) -> ColoredString {
    match update {
        Update::MergedFastForward | Update::Rebased => update.label().green(),
        Update::UpToDate => update.label().normal(),
        Update::SkipConflicting => update.label().red(),
        Update::SkipNoUpstream | Update::SkipUpstreamDeleted => update.label().dimmed(),
    }
}

fn format_stats(stats: &Stats) -> String {
    if stats.is_empty() {
        return format!("  {}", "✔".green());
    }

    let changes = stats.changes();
    let mut out = String::new();
    if stats.commits_behind() > 0 {
        out.push_str(&format!("  {}", format!("↓{}", stats.commits_behind()).cyan()));
    }
    if stats.commits_ahead() > 0 {
        out.push_str(&format!("  {}", format!("↑{}", stats.commits_ahead()).cyan()));
    }
    if changes.unmerged > 0 {
        out.push_str(&format!("  {}", format!("☠{}", changes.unmerged).red()));
    }
    if changes.pending() > 0 {
        out.push_str(&format!("  {}", format!("★{}", changes.pending()).yellow()));
    }
    out
}

fn format_remote_changes(changes: &RemoteBranches, marker: char) -> Vec<String> {
    changes
        .iter()
        .flat_map(|(remote, branches)| {
            branches.iter().map(move |branch| {
                let text = format!("{marker} {remote}/{branch}");
                let text = if marker == '+' { text.green() } else { text.red() };
                format!("   {text}")
            })
        })
        .collect()
}

pub fn print_working_dir(sink: &ProgressSink, path: &Path, config: &Config) {
    if config.is_quiet() {
        return;
    }
    sink.println(&format!(
        "{} {}",
        "Working in:".cyan(),
        path.display().to_string().white().bold()
    ));
}

pub fn print_start(sink: &ProgressSink, count: usize, config: &Config) {
    if config.is_quiet() {
        return;
    }
    if count == 0 {
        sink.println(&"No repositories to manage".yellow().bold().to_string());
    } else {
        sink.println(&format!("Managing {count} repositories").dimmed().to_string());
    }
}

/// Reports directories under the working directory that belong to no target.
pub fn print_superfluous(sink: &ProgressSink, directories: &[PathBuf]) {
    for directory in directories {
        let name = directory.file_name().map_or_else(
            || directory.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        sink.println(&format!(" * {}\n   {}", name.bold(), "superfluous".yellow()));
    }
}

pub fn print_summary(
    sink: &ProgressSink,
    reports: &[WorkerReport],
    duration: Duration,
    config: &Config,
) {
    let lines = if config.is_quiet() {
        quiet_summary(reports)
    } else {
        normal_summary(reports, duration)
    };
    sink.println(&lines.join("\n"));
}

fn quiet_summary(reports: &[WorkerReport]) -> Vec<String> {
    let succeeded = reports.iter().filter(|report| report.succeed).count();
    let mut lines = vec![format!("{succeeded}/{} repositories synchronized", reports.len())];
    lines.extend(reports.iter().filter_map(|report| {
        report.error.as_ref().map(|error| {
            format!("error: {}: {error}", report.target.directory().display())
        })
    }));
    lines
}

fn normal_summary(reports: &[WorkerReport], duration: Duration) -> Vec<String> {
    let mut lines = section("Summary");

    let succeeded = reports.iter().filter(|report| report.succeed).count();
    let skipped: Vec<_> = reports.iter().filter(|report| report.is_skipped()).collect();
    let failed: Vec<_> = reports.iter().filter(|report| report.is_failed()).collect();

    if !skipped.is_empty() {
        lines.push(format!("Skipped ({}):", skipped.len()).yellow().bold().to_string());
        for report in &skipped {
            lines.push(format!(
                "  {} {}",
                "SKIP".yellow().bold(),
                report.target.display_name().white()
            ));
        }
        lines.push(String::new());
    }

    if !failed.is_empty() {
        lines.push(format!("Failed ({}):", failed.len()).red().bold().to_string());
        for report in &failed {
            lines.push(format!(
                "  {} {} {} in {}",
                "FAIL".red().bold(),
                report.target.display_name().white(),
                report.error.as_deref().unwrap_or_default().red(),
                format_duration(report.duration).dimmed(),
            ));
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "{}: {}/{} repos in {}",
        "Total".white().bold(),
        succeeded,
        reports.len(),
        format_duration(duration)
    ));
    lines
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f32())
}

fn section(title: &str) -> Vec<String> {
    let line = "=".repeat(50).cyan().dimmed().to_string();
    let padding = (50 - title.len()) / 2;
    let centered = format!("{:>width$}", title, width = padding + title.len());
    vec![
        String::new(),
        line.clone(),
        centered.cyan().bold().to_string(),
        line,
        String::new(),
    ]
}
