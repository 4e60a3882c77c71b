//! Per-client log configuration.
//!
//! A [`LogConfig`] becomes a `tracing` [`Dispatch`] owned by the client and
//! made current only while one of its operations runs, so two clients can
//! log to different files at different levels without touching the global
//! subscriber.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing::level_filters::LevelFilter;

/// File name of the client log.
pub const LOG_FILE_NAME: &str = "p3270.log";

/// Where and how verbosely a client logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            file: default_log_path(),
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn new(level: LevelFilter, file: impl Into<PathBuf>) -> Self {
        Self {
            level,
            file: file.into(),
        }
    }

    /// Open the log file for appending and build a dispatcher writing to it.
    pub fn dispatch(&self) -> std::io::Result<Dispatch> {
        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)?;
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        Ok(Dispatch::new(subscriber))
    }
}

/// `<data dir>/p3270/p3270.log`, or `p3270.log` in the working directory
/// when the platform has no data directory.
#[must_use]
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir().map_or_else(
        || PathBuf::from(LOG_FILE_NAME),
        |dir| dir.join("p3270").join(LOG_FILE_NAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.log");
        let dispatch = LogConfig::new(LevelFilter::INFO, &path).dispatch().unwrap();

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("Sending PF key 3 to remote host");
            tracing::debug!("filtered out");
        });

        let log = std::fs::read_to_string(&path).unwrap();
        assert!(log.contains("INFO"));
        assert!(log.contains("Sending PF key 3 to remote host"));
        assert!(!log.contains("filtered out"));
        assert!(!log.contains("\x1b["));
    }

    #[test]
    fn test_dispatch_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.log");
        std::fs::write(&path, "previous run\n").unwrap();
        let dispatch = LogConfig::new(LevelFilter::WARN, &path).dispatch().unwrap();
        tracing::dispatcher::with_default(&dispatch, || tracing::warn!("second run"));

        let log = std::fs::read_to_string(&path).unwrap();
        assert!(log.starts_with("previous run\n"));
        assert!(log.contains("second run"));
    }

    #[test]
    fn test_default_path_file_name() {
        assert!(default_log_path().ends_with(LOG_FILE_NAME));
        assert_eq!(LogConfig::default().level, LevelFilter::INFO);
    }
}
