#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ModelError, Result};

/// Generated identifier of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunId {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| ModelError::InvalidRunId {
                value: value.to_string(),
                message: error.to_string(),
            })
    }
}

/// Run lifecycle state. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(ModelError::InvalidEnum {
                field: "run status",
                value: other.to_string(),
            }),
        }
    }
}

/// Record counters reported when a run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub input: u64,
    pub processed: u64,
    pub loaded: u64,
    pub rejected: u64,
}

impl RunCounts {
    pub fn absorb(&mut self, other: RunCounts) {
        self.input += other.input;
        self.processed += other.processed;
        self.loaded += other.loaded;
        self.rejected += other.rejected;
    }
}

/// Captured failure attached to a run that ends `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub message: String,
    /// Short tag naming the kind of failure (e.g. `PartialFailure`).
    pub kind: String,
    pub details: Option<Value>,
}

impl RunFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Capture an error: its message, its type name as the kind, and its
    /// source chain under `causes`.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let kind = type_name
            .split('<')
            .next()
            .and_then(|path| path.rsplit("::").next())
            .unwrap_or(type_name);

        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }

        let failure = Self::new(kind, error.to_string());
        if causes.is_empty() {
            failure
        } else {
            failure.with_details(serde_json::json!({ "causes": causes }))
        }
    }

    /// The persisted error-details payload: the kind tag merged with details.
    pub fn details_payload(&self) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert("error_kind".to_string(), Value::String(self.kind.clone()));
        match &self.details {
            Some(Value::Object(extra)) => {
                for (key, value) in extra {
                    payload.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                payload.insert("context".to_string(), other.clone());
            }
            None => {}
        }
        Value::Object(payload)
    }
}

/// One execution of a pipeline stage against one source unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub pipeline_stage: String,
    pub source_file: Option<String>,
    pub metadata: Option<Value>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub counts: RunCounts,
    pub error_message: Option<String>,
    pub error_details: Option<Value>,
}

impl PipelineRun {
    /// A freshly started run in the `running` state.
    pub fn start(
        pipeline_name: impl Into<String>,
        pipeline_stage: impl Into<String>,
        source_file: Option<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            run_id: RunId::generate(),
            pipeline_name: pipeline_name.into(),
            pipeline_stage: pipeline_stage.into(),
            source_file,
            metadata,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
            counts: RunCounts::default(),
            error_message: None,
            error_details: None,
        }
    }

    /// Move the run to a terminal state. Allowed exactly once.
    pub fn finish(
        &mut self,
        status: RunStatus,
        counts: RunCounts,
        failure: Option<&RunFailure>,
        completed_at: DateTime<Utc>,
        duration_seconds: f64,
    ) -> Result<()> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(ModelError::InvalidTransition {
                run_id: self.run_id.to_string(),
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.counts = counts;
        self.completed_at = Some(completed_at);
        self.duration_seconds = Some(duration_seconds);
        self.error_message = failure.map(|f| f.message.clone());
        self.error_details = failure.map(RunFailure::details_payload);
        Ok(())
    }
}
