//! Run logger
//!
//! Process-wide logging for batch jobs plus step bookkeeping: each named
//! step logs its start, its completion with duration, and stops the
//! process when it fails.

use crate::error::Result;
use chrono::Local;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Exit status of a process stopped by a failed step
pub const FAILURE_EXIT_CODE: i32 = 1;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SEPARATOR_LENGTH: usize = 120;

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: Level,
    /// Write to a file under `log_dir`; stderr only otherwise
    pub save_log: bool,
    /// `{timestamp}.log` per run instead of appending to `{log_name}.log`
    pub new_file_per_run: bool,
    pub log_name: String,
    pub log_dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            save_log: true,
            new_file_per_run: false,
            log_name: "application".to_string(),
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl LogSettings {
    /// File the run writes to, if any
    pub fn log_file(&self) -> Option<PathBuf> {
        if !self.save_log {
            return None;
        }
        let name = if self.new_file_per_run {
            Local::now().format("%Y%m%d_%H%M%S").to_string()
        } else {
            self.log_name.clone()
        };
        Some(self.log_dir.join(format!("{name}.log")))
    }
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEnd {
    Completed { duration: Duration },
    /// `end` without a matching `start`
    MissingStart,
}

/// A step returned an error
#[derive(Debug, Clone, thiserror::Error)]
#[error("{step} failed: {message}")]
pub struct StepFailure {
    pub step: String,
    pub message: String,
}

/// Install the global subscriber and return a logger for step bookkeeping.
///
/// Appending runs get a separator line first. When a global subscriber is
/// already installed the existing one keeps receiving events.
pub fn setup_logger(settings: &LogSettings) -> Result<RunLogger> {
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(settings.level).into())
            .from_env_lossy()
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(false)
        .with_filter(filter());

    let log_file = settings.log_file();
    let mut guard = None;

    let installed = match &log_file {
        Some(path) => {
            std::fs::create_dir_all(&settings.log_dir)?;
            if !settings.new_file_per_run {
                write_separator(path, SEPARATOR_LENGTH)?;
            }

            let file_name = path.file_name().unwrap_or_default();
            let appender = tracing_appender::rolling::never(&settings.log_dir, file_name);
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard = Some(file_guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
                .with_target(false)
                .with_filter(filter());

            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
        }
        None => tracing_subscriber::registry().with(stderr_layer).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
    if let Some(path) = &log_file {
        tracing::info!("Logging to {}", path.display());
    }

    Ok(RunLogger {
        start_times: HashMap::new(),
        log_file,
        guard,
    })
}

fn write_separator(path: &Path, length: usize) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{}", "-".repeat(length))?;
    Ok(())
}

/// Step bookkeeping for one run
pub struct RunLogger {
    start_times: HashMap<String, Instant>,
    log_file: Option<PathBuf>,
    guard: Option<WorkerGuard>,
}

impl RunLogger {
    /// Logger that does not own any subscriber (events go to whatever is
    /// installed)
    pub fn detached(log_file: Option<PathBuf>) -> Self {
        Self {
            start_times: HashMap::new(),
            log_file,
            guard: None,
        }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn start(&mut self, name: &str) {
        self.start_times.insert(name.to_string(), Instant::now());
        tracing::info!("### Start {}: {}", name, Local::now().format(TIMESTAMP_FORMAT));
    }

    pub fn end(&mut self, name: &str) -> StepEnd {
        match self.start_times.remove(name) {
            Some(started) => {
                let duration = started.elapsed();
                tracing::info!(
                    "### Complete {}: {}, Duration: {:?}",
                    name,
                    Local::now().format(TIMESTAMP_FORMAT),
                    duration
                );
                StepEnd::Completed { duration }
            }
            None => {
                tracing::warn!("### End {}: No start time found!", name);
                StepEnd::MissingStart
            }
        }
    }

    /// Write a raw dashed line to the log file, bypassing the formatter
    pub fn add_separator(&self, length: usize) -> Result<()> {
        match &self.log_file {
            Some(path) => write_separator(path, length),
            None => Ok(()),
        }
    }

    /// Run `f` as a named step and report failure to the caller
    pub fn try_step<T, E: Display>(
        &mut self,
        name: &str,
        f: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, StepFailure> {
        self.start(name);
        let result = f();
        self.finish(name, result)
    }

    /// Async version of [`try_step`](Self::try_step)
    pub async fn try_step_async<T, E, F>(&mut self, name: &str, step: F) -> std::result::Result<T, StepFailure>
    where
        E: Display,
        F: Future<Output = std::result::Result<T, E>>,
    {
        self.start(name);
        let result = step.await;
        self.finish(name, result)
    }

    fn finish<T, E: Display>(
        &mut self,
        name: &str,
        result: std::result::Result<T, E>,
    ) -> std::result::Result<T, StepFailure> {
        match result {
            Ok(value) => {
                self.end(name);
                Ok(value)
            }
            Err(e) => {
                self.start_times.remove(name);
                let failure = StepFailure {
                    step: name.to_string(),
                    message: e.to_string(),
                };
                tracing::error!("{}", failure);
                Err(failure)
            }
        }
    }

    /// Run `f` as a named step; a failure stops the process
    pub fn run_step<T, E: Display>(&mut self, name: &str, f: impl FnOnce() -> std::result::Result<T, E>) -> T {
        match self.try_step(name, f) {
            Ok(value) => value,
            Err(failure) => self.halt(&failure.step),
        }
    }

    /// Async version of [`run_step`](Self::run_step)
    pub async fn run_step_async<T, E, F>(&mut self, name: &str, step: F) -> T
    where
        E: Display,
        F: Future<Output = std::result::Result<T, E>>,
    {
        match self.try_step_async(name, step).await {
            Ok(value) => value,
            Err(failure) => self.halt(&failure.step),
        }
    }

    /// Flush buffered log lines and exit with [`FAILURE_EXIT_CODE`]
    pub fn halt(&mut self, step: &str) -> ! {
        eprintln!("Stopping execution due to {step} failure.");
        // Dropping the guard flushes the non-blocking writer
        drop(self.guard.take());
        std::process::exit(FAILURE_EXIT_CODE);
    }
}
