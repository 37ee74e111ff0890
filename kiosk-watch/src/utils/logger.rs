//! Logging Infrastructure
//!
//! Console output always; a daily-rolling log file as well when the log
//! directory exists.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Initialize the logger
///
/// `RUST_LOG` takes precedence over `log_level`. The returned guard flushes
/// the file writer and must be held until exit.
pub fn init_logger(log_level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir
        && dir.is_dir()
    {
        let file_appender = tracing_appender::rolling::daily(dir, "kiosk-watch");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        subscriber
            .with_ansi(false)
            .with_writer(std::io::stdout.and(file_writer))
            .init();
        return Some(guard);
    }

    subscriber.init();
    None
}
