#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};

/// Store-assigned identifier of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub i64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Registered once and not seen with different content since.
    Processed,
    /// Content changed after the first registration.
    Changed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Changed => "changed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "processed" => Ok(Self::Processed),
            "changed" => Ok(Self::Changed),
            other => Err(ModelError::InvalidEnum {
                field: "file status",
                value: other.to_string(),
            }),
        }
    }
}

/// Descriptive fields of a source file; replaced wholesale when content changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFileDescriptor {
    pub file_path: String,
    pub file_name: String,
    /// Lowercase hex SHA-256 of the file bytes.
    pub fingerprint: String,
    pub file_size_bytes: u64,
    pub sheet_count: Option<u64>,
    pub row_count: Option<u64>,
    pub column_count: Option<u64>,
    pub schema_snapshot: Option<Value>,
    pub status: FileStatus,
}

/// Catalog entry for a source file, keyed by path. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFileCatalogEntry {
    pub file_id: FileId,
    pub first_seen: DateTime<Utc>,
    pub last_processed: DateTime<Utc>,
    pub processing_count: u64,
    pub file: SourceFileDescriptor,
}
