//! Run-status record read by the external dashboard

use crate::error::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of one scheduler run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed(String),
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// On-disk shape of the status file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub last_run: String,
    pub status: String,
}

impl StatusRecord {
    pub fn new(at: NaiveDateTime, status: &RunStatus) -> Self {
        Self {
            last_run: at.format(TIMESTAMP_FORMAT).to_string(),
            status: status.to_string(),
        }
    }
}

/// Single overwritten status file
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the record with the outcome of the latest run
    pub fn write(&self, status: &RunStatus, at: NaiveDateTime) -> Result<StatusRecord> {
        let record = StatusRecord::new(at, status);
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&self.path, json)?;
        Ok(record)
    }

    /// Latest record, if any run has completed
    pub fn read(&self) -> Result<Option<StatusRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}
