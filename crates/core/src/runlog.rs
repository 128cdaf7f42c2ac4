//! Append-only run log.
//!
//! One line per run or skip: `[YYYY-MM-DD HH:MM:SS] <message>` in local time.
//! This file is the only user-facing output of a scheduled pass.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::errors::RunLogError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writer for the run log file.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `message` stamped with the current local time.
    pub fn append(&self, message: &str) -> Result<(), RunLogError> {
        self.append_at(Local::now(), message)
    }

    /// Append `message` stamped with `at`.
    pub fn append_at(&self, at: DateTime<Local>, message: &str) -> Result<(), RunLogError> {
        let line = format_line(at, message);
        let wrap = |source| RunLogError::Write {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(wrap)?;
        file.write_all(line.as_bytes()).map_err(wrap)?;

        debug!(path = %self.path.display(), message, "run log appended");
        Ok(())
    }
}

fn format_line(at: DateTime<Local>, message: &str) -> String {
    format!("[{}] {}\n", at.format(TIMESTAMP_FORMAT), message)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_line_format() {
        let at = Local.with_ymd_and_hms(2024, 1, 2, 13, 0, 5).unwrap();
        assert_eq!(
            format_line(at, "No conflicts found"),
            "[2024-01-02 13:00:05] No conflicts found\n"
        );
    }

    #[test]
    fn test_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("deconflicter.log"));
        log.append("Skipped: Obsidian is running").unwrap();
        log.append("No conflicts found").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Skipped: Obsidian is running"));
        assert!(lines[1].ends_with("] No conflicts found"));
    }

    #[test]
    fn test_unwritable_location() {
        let log = RunLog::new("/definitely/not/here/deconflicter.log");
        let err = log.append("x").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here"));
    }
}
