use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "devdash.log";

/// `<cache_dir>/devdash`, where the log file lives.
pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("devdash")
}

/// Initialise logging.
///
/// The dashboard owns the terminal while it runs, so normal runs log at
/// `info` to a file in [`log_dir`]. Debug runs never draw and log at `debug`
/// to stderr, where `RUST_LOG` may override the level. Keep the returned
/// guard alive until exit or buffered lines are lost.
pub fn init(debug: bool) -> Option<WorkerGuard> {
    if debug {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return None;
    }

    let dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("logging disabled, cannot create {}: {}", dir.display(), e);
        return None;
    }

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Some(guard)
}
