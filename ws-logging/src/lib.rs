//! Tracing subscriber setup shared by the control-plane binaries.
//!
//! Everything is driven by environment variables so the same binary can log
//! human-readable output on a developer machine and JSON into a rolling file
//! in production:
//!
//! - `WS_LOG_LEVEL`: default filter when `RUST_LOG` is unset (`info`)
//! - `WS_LOG_OUTPUT`: `console`, `file`, `both` or `none` (`console`)
//! - `WS_LOG_FORMAT`: `human` or `json` (`human`)
//! - `WS_LOG_FILE_PATH`: log file for the `file`/`both` outputs

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt::MakeWriter, prelude::*, registry, EnvFilter};

const DEFAULT_LOG_FILE: &str = "/tmp/ws-runtime.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub file_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Console,
            format: LogFormat::Human,
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let output = match lookup("WS_LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            Some("none") => LogOutput::None,
            _ => LogOutput::Console,
        };
        let format = match lookup("WS_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };

        Self {
            level: lookup("WS_LOG_LEVEL").unwrap_or(defaults.level),
            output,
            format,
            file_path: lookup("WS_LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    fn file_parts(&self) -> (&Path, &Path) {
        let dir = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("/tmp"));
        let file = self
            .file_path
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new("ws-runtime.log"));
        (dir, file)
    }
}

/// Writer for `WS_LOG_OUTPUT=both`: each line goes to the console and the
/// file. Only file failures are reported; a closed stdout is skipped.
struct ConsoleAndFile<C, F> {
    console: C,
    file: F,
}

impl<C: Write, F: Write> Write for ConsoleAndFile<C, F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.console.write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

#[derive(Clone)]
struct ConsoleAndFileWriter {
    file: NonBlocking,
}

impl<'a> MakeWriter<'a> for ConsoleAndFileWriter {
    type Writer = ConsoleAndFile<io::Stdout, NonBlocking>;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleAndFile {
            console: io::stdout(),
            file: self.file.clone(),
        }
    }
}

fn build_filter(level: &str) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    ["hyper=warn", "reqwest=warn", "tokio=warn"]
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(filter, |filter, directive| filter.add_directive(directive))
}

/// Initializes the global tracing subscriber from the environment.
///
/// The returned guard must be held for the lifetime of the process when file
/// output is enabled, otherwise buffered lines are lost on exit.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogConfig::from_env())
}

/// Initializes the global tracing subscriber from an explicit config.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_with(config: &LogConfig) -> Option<WorkerGuard> {
    let subscriber = registry().with(build_filter(&config.level));
    let json = config.format == LogFormat::Json;

    let (dir, file) = config.file_parts();
    let mut guard = None;

    let result = match config.output {
        LogOutput::None => subscriber.try_init(),
        LogOutput::Console => {
            let layer = tracing_subscriber::fmt::layer().with_writer(io::stdout);
            if json {
                subscriber.with(layer.json()).try_init()
            } else {
                subscriber.with(layer).try_init()
            }
        }
        LogOutput::File => {
            let (writer, file_guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file));
            guard = Some(file_guard);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            if json {
                subscriber.with(layer.json()).try_init()
            } else {
                subscriber.with(layer).try_init()
            }
        }
        LogOutput::Both => {
            let (writer, file_guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file));
            guard = Some(file_guard);
            let both = ConsoleAndFileWriter { file: writer };
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(both);
            if json {
                subscriber.with(layer.json()).try_init()
            } else {
                subscriber.with(layer).try_init()
            }
        }
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed, keeping the existing one");
    }

    guard
}
