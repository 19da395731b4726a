//! Source file catalog with content-based change detection.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::Utc;
use hsi_model::{FileId, FileStatus, SourceFileDescriptor};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ObserveError, Result};
use crate::store::ObservabilityStore;

/// Lowercase hex SHA-256 of a file's content and the number of bytes hashed.
///
/// Size and digest come from the same read, so they always describe the
/// same content.
pub fn fingerprint_file(path: &Path) -> Result<(String, u64)> {
    let file = File::open(path).map_err(|e| ObserveError::io("read", path, e))?;
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut BufReader::new(file), &mut hasher)
        .map_err(|e| ObserveError::io("read", path, e))?;
    Ok((hex::encode(hasher.finalize()), size))
}

/// Shape information captured alongside the fingerprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileRegistration {
    pub sheet_count: Option<u64>,
    pub row_count: Option<u64>,
    pub column_count: Option<u64>,
    pub schema_snapshot: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    /// First time this path was seen.
    New,
    /// Same path, same fingerprint.
    Unchanged,
    /// Same path, different fingerprint; the catalog entry was overwritten.
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub file_id: FileId,
    pub change: FileChange,
    pub fingerprint: String,
}

pub struct SourceFileRegistry<'s> {
    store: &'s dyn ObservabilityStore,
}

impl<'s> SourceFileRegistry<'s> {
    pub fn new(store: &'s dyn ObservabilityStore) -> Self {
        Self { store }
    }

    /// Fingerprint `path` and record it in the catalog.
    ///
    /// The lookup and the write are separate store calls; concurrent
    /// registration of the same path is not serialized.
    pub fn register(&self, path: &Path, registration: FileRegistration) -> Result<RegistrationOutcome> {
        let (fingerprint, file_size_bytes) = fingerprint_file(path)?;
        let file_path = path.display().to_string();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.clone());
        let now = Utc::now();

        let Some(existing) = self.store.find_source_file(&file_path)? else {
            let descriptor = SourceFileDescriptor {
                file_path,
                file_name,
                fingerprint: fingerprint.clone(),
                file_size_bytes,
                sheet_count: registration.sheet_count,
                row_count: registration.row_count,
                column_count: registration.column_count,
                schema_snapshot: registration.schema_snapshot,
                status: FileStatus::Processed,
            };
            let file_id = self.store.insert_source_file(&descriptor, now)?;
            info!(file = %descriptor.file_name, file_id = %file_id, "registered new source file");
            return Ok(RegistrationOutcome {
                file_id,
                change: FileChange::New,
                fingerprint,
            });
        };

        if existing.file.fingerprint == fingerprint {
            self.store.touch_source_file(existing.file_id, now)?;
            debug!(file = %file_name, file_id = %existing.file_id, "source file unchanged");
            return Ok(RegistrationOutcome {
                file_id: existing.file_id,
                change: FileChange::Unchanged,
                fingerprint,
            });
        }

        let descriptor = SourceFileDescriptor {
            file_path,
            file_name,
            fingerprint: fingerprint.clone(),
            file_size_bytes,
            sheet_count: registration.sheet_count,
            row_count: registration.row_count,
            column_count: registration.column_count,
            schema_snapshot: registration.schema_snapshot,
            status: FileStatus::Changed,
        };
        self.store
            .replace_source_file(existing.file_id, &descriptor, now)?;
        info!(
            file = %descriptor.file_name,
            file_id = %existing.file_id,
            previous = %existing.file.fingerprint,
            current = %fingerprint,
            "source file content changed"
        );
        Ok(RegistrationOutcome {
            file_id: existing.file_id,
            change: FileChange::Changed,
            fingerprint,
        })
    }
}
