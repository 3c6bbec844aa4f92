//! Logging initialization.
//!
//! Console output always goes to stdout in compact form. When a log file is
//! configured, a second layer writes plain-text lines to a daily rolling file
//! through a non-blocking writer.

use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Default filter when neither the configured level nor `RUST_LOG` is set.
const DEFAULT_LEVEL: &str = "info";

/// Build the filter: configured level > `RUST_LOG` > `info`.
fn env_filter(log_level: Option<&str>) -> EnvFilter {
    match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("Invalid log level {:?} ({}), using {}", level, e, DEFAULT_LEVEL);
            EnvFilter::new(DEFAULT_LEVEL)
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)),
    }
}

/// Split a log file path into the directory and file-name prefix used by
/// the rolling appender.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pizzaz.log".to_string());
    (dir, prefix)
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init(log_file: Option<&Path>, log_level: Option<&str>) -> Option<WorkerGuard> {
    let console_layer = fmt::layer().with_target(false).compact();

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (dir, prefix) = split_log_path(path);
            if let Err(e) = std::fs::create_dir_all(&dir) {
                eprintln!("Failed to create log directory {}: {}", dir.display(), e);
                (None, None)
            } else {
                let appender = tracing_appender::rolling::daily(&dir, prefix);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_timer(UtcTime::new(Rfc3339))
                    .boxed();
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        tracing::info!("Writing logs to {}", path.display());
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, prefix) = split_log_path(Path::new("/var/log/pizzaz/server.log"));
        assert_eq!(dir, PathBuf::from("/var/log/pizzaz"));
        assert_eq!(prefix, "server.log");

        let (dir, prefix) = split_log_path(Path::new("server.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(prefix, "server.log");
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        assert!(env_filter(Some("debug")).to_string().contains("debug"));
        let filter = env_filter(Some("pizzaz=trace,tower_http=debug")).to_string();
        assert!(filter.contains("pizzaz=trace"));
        assert!(filter.contains("tower_http=debug"));
    }
}
