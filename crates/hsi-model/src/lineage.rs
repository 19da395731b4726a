#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::run::RunId;

/// How a target column was produced from its source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    DirectCopy,
    Unpivot,
    Aggregate,
    Derived,
}

impl TransformationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectCopy => "direct_copy",
            Self::Unpivot => "unpivot",
            Self::Aggregate => "aggregate",
            Self::Derived => "derived",
        }
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationType {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "direct_copy" => Ok(Self::DirectCopy),
            "unpivot" => Ok(Self::Unpivot),
            "aggregate" => Ok(Self::Aggregate),
            "derived" => Ok(Self::Derived),
            other => Err(ModelError::InvalidEnum {
                field: "transformation type",
                value: other.to_string(),
            }),
        }
    }
}

/// Mapping from one warehouse column back to the source column that fed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLineage {
    pub target_table: String,
    pub target_column: String,
    pub source_file: String,
    pub source_sheet: Option<String>,
    pub source_column: String,
    pub transformation_type: TransformationType,
    pub transformation_logic: String,
}

/// A lineage fact as persisted against a run. Never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLineageRecord {
    pub run_id: RunId,
    pub recorded_at: DateTime<Utc>,
    pub lineage: FieldLineage,
}
