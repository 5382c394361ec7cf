//! Domain records exchanged with the attendance server.
//!
//! These types deserialize straight from the server's JSON. Fields the server
//! sometimes omits or sends as `null` fall back to their defaults.
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Server-issued identifier of an asynchronous extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job state as reported by the status endpoint.
///
/// Only `completed` and `error` are terminal; every other string, including
/// ones this client does not know, keeps the tracker polling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Error,
    Other(String),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            "error" => TaskStatus::Error,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        TaskStatus::from(raw.to_string())
    }
}

/// One artifact produced by an extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CreatedFileWire")]
pub struct CreatedFile {
    pub name: String,
    pub page: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedFileWire {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        page: Option<u32>,
    },
}

impl From<CreatedFileWire> for CreatedFile {
    fn from(wire: CreatedFileWire) -> Self {
        match wire {
            CreatedFileWire::Name(name) => CreatedFile { name, page: None },
            CreatedFileWire::Detailed { name, page } => CreatedFile { name, page },
        }
    }
}

/// Point-in-time read of an extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "percent")]
    pub progress: u8,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files_created: Vec<CreatedFile>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskSnapshot {
    pub fn new(status: impl Into<TaskStatus>, progress: u8) -> Self {
        Self {
            status: status.into(),
            message: String::new(),
            progress,
            current_page: None,
            total: None,
            files_created: Vec::new(),
            error: None,
        }
    }

    /// `(current, total)` once the job has reached its first page.
    pub fn page_counter(&self) -> Option<(u32, u32)> {
        match self.current_page {
            Some(current) if current > 0 => Some((current, self.total.unwrap_or(0))),
            _ => None,
        }
    }
}

/// Final state of a tracked job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { files: Vec<CreatedFile> },
    Failed { error: String },
    /// Tracking stopped on request; the job may still be running server-side.
    Cancelled,
}

/// Category tag of a server log line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogCategory {
    #[default]
    Default,
    Info,
    Success,
    Warning,
    Error,
    Other(String),
}

impl LogCategory {
    pub fn as_str(&self) -> &str {
        match self {
            LogCategory::Default => "default",
            LogCategory::Info => "info",
            LogCategory::Success => "success",
            LogCategory::Warning => "warning",
            LogCategory::Error => "error",
            LogCategory::Other(tag) => tag,
        }
    }
}

impl From<&str> for LogCategory {
    fn from(tag: &str) -> Self {
        match tag {
            "" | "default" => LogCategory::Default,
            "info" => LogCategory::Info,
            "success" => LogCategory::Success,
            "warning" => LogCategory::Warning,
            "error" => LogCategory::Error,
            other => LogCategory::Other(other.to_string()),
        }
    }
}

/// One user-visible line in the log panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub category: LogCategory,
    pub message: String,
}

impl LogEvent {
    pub fn new(category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogCategory::Info, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct AnalysisSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_persons: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_missing: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub persons_with_issues: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_matched: u64,
}

/// A day on which a person's attendance is incomplete.
///
/// Unknown fields are kept in `extra` so the record goes back to the export
/// endpoint exactly as the server produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub person_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weekday: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issue_description: String,
    #[serde(default)]
    pub matched_image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Analysis Result Set returned by `POST /api/analyze-full`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub summary: AnalysisSummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRequest {
    pub project_name: String,
    pub month: String,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractedFolder {
    pub folder: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<FileEntry>,
}

/// Whether the server can run PDF extraction at all.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PdfAvailability {
    pub available: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(value.round().clamp(0.0, 100.0) as u8)
}
