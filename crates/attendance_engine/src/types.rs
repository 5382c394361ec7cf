use std::path::PathBuf;

use attendance_core::{
    AnalysisReport, ExtractedFolder, FileEntry, LogEvent, PdfAvailability, TaskId, TaskOutcome,
    TaskSnapshot,
};

use crate::ApiError;

/// Everything the engine reports back to the controller thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Filtered line from the log stream of the running analysis.
    Log(LogEvent),
    AnalysisFinished(Result<AnalysisReport, ApiError>),
    ExportFinished(Result<String, ApiError>),
    ResultFilesLoaded(Result<Vec<FileEntry>, ApiError>),
    Downloaded(Result<PathBuf, ApiError>),
    PdfChecked(Result<PdfAvailability, ApiError>),
    PdfUploaded(Result<String, ApiError>),
    ExtractionStarted {
        task_id: TaskId,
    },
    /// The job never started: the request failed or another job is tracked.
    ExtractionFailed(String),
    TaskProgress {
        task_id: TaskId,
        snapshot: TaskSnapshot,
    },
    TaskFinished {
        task_id: TaskId,
        outcome: TaskOutcome,
    },
    PdfUploadsLoaded(Result<Vec<FileEntry>, ApiError>),
    ExtractedFilesLoaded(Result<Vec<ExtractedFolder>, ApiError>),
}
