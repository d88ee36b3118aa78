//! Tracing setup and the observer that turns worker activities into log events.
//!
//! Log lines are routed through the shared [`ProgressSink`] so they never tear
//! through a status block or a progress bar.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tracing::{Level, debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::activity::{Activity, WorkerObserver};
use crate::config::Verbosity;
use crate::output::ProgressSink;
use crate::worker::Worker;

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the level derived from `verbosity`.
pub fn init_logging(verbosity: Verbosity, sink: Arc<ProgressSink>) -> anyhow::Result<()> {
    let level = verbosity.max_level().as_str().to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{}={level}", env!("CARGO_CRATE_NAME"))))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(SinkWriter::new(sink))
        .with_ansi(io::stdout().is_terminal())
        .with_target(false)
        .without_time()
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install the log subscriber: {err}"))
}

/// [`MakeWriter`] handing out one buffered line per event.
pub struct SinkWriter {
    sink: Arc<ProgressSink>,
}

impl SinkWriter {
    pub fn new(sink: Arc<ProgressSink>) -> Self {
        Self { sink }
    }
}

impl<'a> MakeWriter<'a> for SinkWriter {
    type Writer = SinkLine;

    fn make_writer(&'a self) -> Self::Writer {
        SinkLine {
            sink: Arc::clone(&self.sink),
            buffer: Vec::new(),
        }
    }
}

/// Collects one formatted event and hands it to the sink when dropped.
pub struct SinkLine {
    sink: Arc<ProgressSink>,
    buffer: Vec<u8>,
}

impl Write for SinkLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SinkLine {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buffer);
        let text = text.trim_end();
        if !text.is_empty() {
            self.sink.println(text);
        }
    }
}

/// Emits every activity as an event at its action's level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl WorkerObserver for LoggingObserver {
    fn start(&self, worker: &Worker) {
        trace!(repo = %worker.target().display_name(), "worker started");
    }

    fn activity(&self, activity: &Activity, worker: &Worker) {
        let repo = worker.target().display_name();
        let action = activity.action();
        let message = activity.message();

        match action.level() {
            Level::ERROR => error!(%repo, %action, "{message}"),
            Level::WARN => warn!(%repo, %action, "{message}"),
            Level::INFO => info!(%repo, %action, "{message}"),
            Level::DEBUG => debug!(%repo, %action, "{message}"),
            _ => trace!(%repo, %action, "{message}"),
        }
    }

    fn end(&self, worker: &Worker) {
        let report = worker.report();
        debug!(
            repo = %worker.target().display_name(),
            succeed = report.succeed,
            elapsed = ?report.duration,
            "worker finished"
        );
    }
}
