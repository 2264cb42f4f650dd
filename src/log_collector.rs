//! Build logging pipeline.
//!
//! `LogCollector` is installed as the global `log` backend. Every record is
//! written to stderr and, when a log directory is configured, appended to a
//! per-session file:
//!
//! ```text
//! log::info!(...) / log_stage!(...)
//!     |
//! [LogCollector]
//!     |
//! +---+---+
//! |       |
//! v       v
//! stderr  <log_dir>/build-<YYYYmmdd-HHMMSS>.log
//! ```
//!
//! Records on the `stage` target are pipeline milestones and get a `==>` prefix.

use anyhow::Context;
use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Target used for stage milestone records.
pub const STAGE_TARGET: &str = "stage";

/// Environment variable consulted when no verbosity flag is given.
pub const LOG_ENV_VAR: &str = "KIWIOS_LOG";

/// Log a pipeline milestone on the `stage` target.
#[macro_export]
macro_rules! log_stage {
    ($($arg:tt)+) => {
        $crate::log::info!(target: $crate::log_collector::STAGE_TARGET, $($arg)+)
    };
}

/// Default log directory for a project root: `<root>/logs`.
///
/// Kept outside the output directory so the shallow clean never removes it.
pub fn get_logs_path(root: &Path) -> PathBuf {
    root.join("logs")
}

pub fn ensure_logs_dir_exists(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create logs directory {}", log_dir.display()))
}

/// Pick the level filter from the command-line flags and the environment.
///
/// `--quiet` wins over `--verbose`; the environment is only consulted when
/// neither flag is set, and an unparseable value falls back to `info`.
pub fn level_from_flags(verbose: bool, quiet: bool, env: Option<&str>) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    if verbose {
        return LevelFilter::Debug;
    }
    env.and_then(|value| value.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Render one record as a log line, without the trailing newline.
pub fn format_line(level: Level, target: &str, message: &str) -> String {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    if target == STAGE_TARGET {
        format!("[{}] {:<5} ==> {}", timestamp, level, message)
    } else {
        format!("[{}] {:<5} {}", timestamp, level, message)
    }
}

/// Logger writing to stderr and an optional session file.
pub struct LogCollector {
    level: LevelFilter,
    session_path: Option<PathBuf>,
    session_file: Option<Mutex<File>>,
}

impl LogCollector {
    /// Create a collector. With `log_dir` set, a new session file is opened in it.
    pub fn new(level: LevelFilter, log_dir: Option<&Path>) -> anyhow::Result<Self> {
        let (session_path, session_file) = match log_dir {
            Some(dir) => {
                ensure_logs_dir_exists(dir)?;
                let path = dir.join(format!("build-{}.log", Local::now().format("%Y%m%d-%H%M%S")));
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open session log {}", path.display()))?;
                (Some(path), Some(Mutex::new(file)))
            }
            None => (None, None),
        };

        Ok(LogCollector {
            level,
            session_path,
            session_file,
        })
    }

    pub fn session_log_path(&self) -> Option<&Path> {
        self.session_path.as_deref()
    }

    /// Append a line to the session file, if there is one.
    fn persist(&self, line: &str) {
        if let Some(file) = &self.session_file {
            if let Ok(mut file) = file.lock() {
                // A failed write must not take the build down with it.
                let _ = writeln!(file, "{}", line);
            }
        }
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.target(), &record.args().to_string());
        eprintln!("{}", line);
        self.persist(&line);
    }

    fn flush(&self) {
        if let Some(file) = &self.session_file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Install a `LogCollector` as the global logger.
///
/// Returns the session log path, if one was opened.
pub fn init(level: LevelFilter, log_dir: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    let collector = LogCollector::new(level, log_dir)?;
    let session = collector.session_log_path().map(Path::to_path_buf);
    log::set_boxed_logger(Box::new(collector))
        .map(|()| log::set_max_level(level))
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_level_flags() {
        assert_eq!(level_from_flags(false, false, None), LevelFilter::Info);
        assert_eq!(level_from_flags(true, false, None), LevelFilter::Debug);
        assert_eq!(level_from_flags(true, true, None), LevelFilter::Error);
        assert_eq!(level_from_flags(false, false, Some("trace")), LevelFilter::Trace);
        assert_eq!(level_from_flags(true, false, Some("warn")), LevelFilter::Debug);
        assert_eq!(level_from_flags(false, false, Some("loud")), LevelFilter::Info);
    }

    #[test]
    fn test_stage_lines_are_marked() {
        let line = format_line(Level::Info, STAGE_TARGET, "Compiling kernel...");
        assert!(line.ends_with("INFO  ==> Compiling kernel..."));

        let plain = format_line(Level::Warn, "kiwios_builder", "careful");
        assert!(plain.ends_with("WARN  careful"));
        assert!(!plain.contains("==>"));
    }

    #[test]
    fn test_session_file_receives_enabled_records() {
        let dir = TempDir::new().expect("tempdir");
        let collector = LogCollector::new(LevelFilter::Info, Some(dir.path())).expect("collector");

        collector.log(
            &Record::builder()
                .level(Level::Info)
                .target(STAGE_TARGET)
                .args(format_args!("Linking kernel image..."))
                .build(),
        );
        collector.log(
            &Record::builder()
                .level(Level::Debug)
                .target("kiwios_builder")
                .args(format_args!("hidden"))
                .build(),
        );
        collector.flush();

        let path = collector.session_log_path().expect("session path");
        let contents = std::fs::read_to_string(path).expect("read log");
        assert!(contents.contains("==> Linking kernel image..."));
        assert!(!contents.contains("hidden"));
    }

    #[test]
    fn test_no_log_dir_means_no_file() {
        let collector = LogCollector::new(LevelFilter::Info, None).expect("collector");
        assert!(collector.session_log_path().is_none());
    }
}
