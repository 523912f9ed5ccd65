use crate::error::PriceWatchError;
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_ALERT_LOG: &str = "alerts.log";
pub const LOG_VIEW_LINES: usize = 50;

/// Append-only text file, one line per alert.
#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &str, at: DateTime<Local>) -> Result<(), PriceWatchError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_line(message, at).as_bytes())?;
        Ok(())
    }

    /// Last `n` lines, or `None` when nothing was ever logged.
    pub fn tail(&self, n: usize) -> Result<Option<Vec<String>>, PriceWatchError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = contents.lines().collect();
        let start = lines.len().saturating_sub(n);
        Ok(Some(lines[start..].iter().map(|l| l.to_string()).collect()))
    }
}

pub fn format_line(message: &str, at: DateTime<Local>) -> String {
    format!("[{}] {}\n", at.format("%Y-%m-%d %H:%M:%S"), message)
}
