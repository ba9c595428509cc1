use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use strum::Display;

/// Opaque identifier issued by the processing service when a job is submitted.
///
/// The client never edits a handle; it only echoes it back on later calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of an export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportHandle(String);

impl ExportHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lifecycle of a processing job, as reported by the service.
///
/// Decoding is strict: a value outside this set is a protocol violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Wire values of the optional export-status field.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum WireExportStatus {
    InProgress,
    Succeeded,
    Failed,
}

/// Export progress of a job. `NotRequested` replaces the absent wire field.
#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportState {
    #[default]
    NotRequested,
    InProgress,
    Succeeded,
    Failed,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExportState::Succeeded | ExportState::Failed)
    }
}

fn deserialize_export_state<'de, D>(deserializer: D) -> Result<ExportState, D::Error>
where
    D: Deserializer<'de>,
{
    let wire = Option::<WireExportStatus>::deserialize(deserializer)?;
    Ok(match wire {
        None => ExportState::NotRequested,
        Some(WireExportStatus::InProgress) => ExportState::InProgress,
        Some(WireExportStatus::Succeeded) => ExportState::Succeeded,
        Some(WireExportStatus::Failed) => ExportState::Failed,
    })
}

/// Snapshot returned by a status query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobDetails {
    #[serde(rename = "Arn")]
    pub handle: JobHandle,
    #[serde(default)]
    pub name: Option<String>,
    pub status: JobStatus,
    #[serde(default, deserialize_with = "deserialize_export_state")]
    pub export_status: ExportState,
    #[serde(default)]
    pub error_details: Option<ErrorDetails>,
    #[serde(default)]
    pub export_error_details: Option<ErrorDetails>,
}

impl JobDetails {
    /// Best available human-readable reason for a failure, if the service gave one.
    pub fn failure_reason(&self) -> String {
        self.error_details
            .as_ref()
            .or(self.export_error_details.as_ref())
            .map(ErrorDetails::to_string)
            .unwrap_or_else(|| "no details reported".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorDetails {
    #[serde(default, rename = "Type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.message) {
            (Some(kind), Some(message)) => write!(f, "{kind}: {message}"),
            (None, Some(message)) => f.write_str(message),
            (Some(kind), None) => f.write_str(kind),
            (None, None) => f.write_str("unspecified error"),
        }
    }
}
