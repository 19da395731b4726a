use serde::{Deserialize, Serialize};

/// Knobs for header detection and loading, from the `[transform]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Data rows scanned for a period header.
    pub header_scan_rows: usize,
    /// Period-shaped cells a row needs to count as the header.
    pub min_period_cells: usize,
    /// Warehouse table named in lineage and quality facts.
    pub target_table: String,
    /// Block loading a sheet whose completeness or validity checks fail.
    pub fail_on_quality_errors: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            header_scan_rows: 10,
            min_period_cells: 2,
            target_table: "fact_indicator_values".to_string(),
            fail_on_quality_errors: true,
        }
    }
}
