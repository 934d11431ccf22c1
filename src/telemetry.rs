use crate::app::RotatingLog;
use crate::config::LoggingConfig;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

static TRACING_INIT: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Where log records end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTargets {
    pub file: bool,
    pub stderr: bool,
}

/// Install the global subscriber once. Returns the log file in use, if any.
///
/// A log file that cannot be opened falls back to stderr so startup errors stay visible;
/// the open error is reported through the returned `Err` on the first call only.
pub fn init_tracing(config: &LoggingConfig, targets: LogTargets) -> io::Result<Option<PathBuf>> {
    let mut open_error = None;
    let active = TRACING_INIT.get_or_init(|| {
        let file = if targets.file {
            match RotatingLog::open(&config.file, config.max_bytes, config.backup_count) {
                Ok(log) => Some(log),
                Err(err) => {
                    open_error = Some(err);
                    None
                }
            }
        } else {
            None
        };
        let path = file.as_ref().map(|log| log.path().to_path_buf());
        let to_stderr = targets.stderr || open_error.is_some();
        let writer = match (file, to_stderr) {
            (Some(log), true) => BoxMakeWriter::new(Mutex::new(log).and(io::stderr)),
            (Some(log), false) => BoxMakeWriter::new(Mutex::new(log)),
            (None, true) => BoxMakeWriter::new(io::stderr),
            (None, false) => BoxMakeWriter::new(io::sink),
        };
        install(config, writer);
        path
    });
    match open_error {
        Some(err) => Err(err),
        None => Ok(active.clone()),
    }
}

fn install(config: &LoggingConfig, writer: BoxMakeWriter) {
    let builder = tracing_subscriber::fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_max_level(config.level.to_level())
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(writer);
    if config.json {
        let subscriber = builder
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let _ = tracing::subscriber::set_global_default(builder.finish());
    }
}
