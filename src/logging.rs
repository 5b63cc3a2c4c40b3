//! Log lifecycle management: timestamped file naming, subscriber wiring,
//! and retention-based cleanup.
//!
//! The client adapters only emit `tracing` events; everything about where
//! those events go lives here. Precedence for each knob is explicit
//! argument > configuration file > built-in default.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Settings;

const DEFAULT_FILE_PATTERN: &str = "{prefix}_{run_id}_{pid}.log";
const DEFAULT_BASE_DIR: &str = "logs";

fn resolve_level(name: Option<&str>) -> LevelFilter {
    match name.map(str::to_ascii_uppercase).as_deref() {
        Some("TRACE") => LevelFilter::TRACE,
        Some("DEBUG") => LevelFilter::DEBUG,
        Some("WARNING" | "WARN") => LevelFilter::WARN,
        Some("ERROR") => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Owns the logger lifecycle: file naming, handler setup, retention.
#[derive(Debug, Clone)]
pub struct LogManager {
    prefix: String,
    base_dir: PathBuf,
    file_pattern: String,
    level: LevelFilter,
    console: bool,
}

impl LogManager {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            level: LevelFilter::INFO,
            console: false,
        }
    }

    /// Like [`new`](Self::new), but the base directory, pattern and level
    /// fall back to configuration values before the defaults.
    #[must_use]
    pub fn from_settings(prefix: impl Into<String>, settings: &Settings) -> Self {
        let mut lm = Self::new(prefix);
        if let Some(dir) = settings.log_dir() {
            lm.base_dir = PathBuf::from(dir);
        }
        if let Some(pattern) = settings.log_name_pattern() {
            lm.file_pattern = pattern.to_string();
        }
        lm.level = resolve_level(settings.log_level());
        lm
    }

    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = resolve_level(Some(level));
        self
    }

    #[must_use]
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Expand the file pattern with the current UTC timestamp and pid.
    /// Returns the full path and the run id baked into it.
    #[must_use]
    pub fn build_log_path(&self) -> (PathBuf, String) {
        let now = Utc::now();
        let run_id = format!("{}_{}", now.format("%Y%m%d"), now.format("%H%M%S"));
        let file_name = self
            .file_pattern
            .replace("{prefix}", &self.prefix)
            .replace("{run_id}", &run_id)
            .replace("{pid}", &std::process::id().to_string());
        (self.base_dir.join(file_name), run_id)
    }

    /// Install the global subscriber: a DEBUG-level file layer plus an
    /// optional console layer at the configured level.
    ///
    /// # Errors
    /// Fails if the log directory or file cannot be created, or if a global
    /// subscriber is already installed.
    pub fn setup(&self) -> io::Result<(PathBuf, String)> {
        fs::create_dir_all(&self.base_dir)?;
        let (path, run_id) = self.build_log_path();
        let file = File::create(&path)?;

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .with_filter(LevelFilter::DEBUG);
        let console_layer = self
            .console
            .then(|| tracing_subscriber::fmt::layer().with_filter(self.level));

        tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer)
            .try_init()
            .map_err(io::Error::other)?;

        tracing::debug!(path = %path.display(), run_id = %run_id, prefix = %self.prefix, "logger initialized");
        Ok((path, run_id))
    }

    /// Delete `*.log` files under the base directory older than `keep_days`.
    /// Per-file errors are skipped. Returns how many files were removed.
    #[must_use]
    pub fn cleanup(&self, keep_days: u64, recursive: bool) -> usize {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(keep_days.saturating_mul(86_400)))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        remove_logs_older_than(&self.base_dir, cutoff, recursive)
    }
}

fn remove_logs_older_than(dir: &Path, cutoff: SystemTime, recursive: bool) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                removed += remove_logs_older_than(&path, cutoff, recursive);
            }
            continue;
        }
        if path.extension().is_none_or(|ext| ext != "log") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(mtime) = meta.modified() else { continue };
        if mtime < cutoff && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_expansion_includes_prefix_run_id_and_pid() {
        let lm = LogManager::new("db").with_base_dir("/tmp/x");
        let (path, run_id) = lm.build_log_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("db_"));
        assert!(name.ends_with(".log"));
        assert!(name.contains(&run_id));
        assert!(name.contains(&std::process::id().to_string()));
    }

    #[test]
    fn unknown_level_name_falls_back_to_info() {
        assert_eq!(resolve_level(Some("chatty")), LevelFilter::INFO);
        assert_eq!(resolve_level(None), LevelFilter::INFO);
        assert_eq!(resolve_level(Some("warning")), LevelFilter::WARN);
    }

    #[test]
    fn cleanup_of_missing_directory_removes_nothing() {
        let lm = LogManager::new("db").with_base_dir("/nonexistent/logdir");
        assert_eq!(lm.cleanup(14, false), 0);
    }
}
