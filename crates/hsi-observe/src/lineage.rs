use hsi_model::{FieldLineage, TransformationType};

use crate::error::Result;
use crate::tracker::RunTracker;

/// Records field lineage for one source sheet feeding one target table.
///
/// The source context is fixed at construction so call sites only name the
/// column mapping.
pub struct LineageRecorder<'t, 's> {
    tracker: &'t RunTracker<'s>,
    target_table: String,
    source_file: String,
    source_sheet: Option<String>,
}

impl<'t, 's> LineageRecorder<'t, 's> {
    pub fn new(
        tracker: &'t RunTracker<'s>,
        target_table: impl Into<String>,
        source_file: impl Into<String>,
        source_sheet: Option<String>,
    ) -> Self {
        Self {
            tracker,
            target_table: target_table.into(),
            source_file: source_file.into(),
            source_sheet,
        }
    }

    /// Append one lineage fact to the active run.
    pub fn record(
        &self,
        target_column: &str,
        source_column: &str,
        transformation_type: TransformationType,
        transformation_logic: &str,
    ) -> Result<()> {
        self.tracker.track_lineage(FieldLineage {
            target_table: self.target_table.clone(),
            target_column: target_column.to_string(),
            source_file: self.source_file.clone(),
            source_sheet: self.source_sheet.clone(),
            source_column: source_column.to_string(),
            transformation_type,
            transformation_logic: transformation_logic.to_string(),
        })
    }
}
