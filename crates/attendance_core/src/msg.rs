use std::path::PathBuf;

use crate::{
    AnalysisReport, ExtractedFolder, FileEntry, LogEvent, PdfAvailability, TaskId, TaskOutcome,
    TaskSnapshot,
};

/// Inputs to [`crate::update`]. User actions come first, engine results after.
///
/// Engine failures arrive as display strings; the controller only shows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User switched to another tab.
    TabSelected(crate::Tab),
    /// User clicked "Start analysis".
    AnalyzeClicked,
    /// User asked for a Word export of the last analysis.
    ExportClicked { project_name: String, month: String },
    /// User clicked refresh on the results tab.
    RefreshClicked,
    /// User asked to save a result document locally.
    DownloadResultClicked { name: String, dest_dir: PathBuf },
    /// User picked a local file to upload for extraction.
    PdfFileChosen(PathBuf),
    /// User selected an already uploaded PDF.
    PdfSelected(String),
    /// User clicked "Start extraction".
    ExtractClicked,
    /// User gave up on watching the running extraction.
    CancelExtractionClicked,
    /// User asked to save an extracted document locally.
    DownloadExtractedClicked {
        folder: String,
        name: String,
        dest_dir: PathBuf,
    },
    /// User asked whether the server can split PDFs.
    PdfCheckClicked,

    /// Live line from the log stream.
    LogReceived(LogEvent),
    AnalysisFinished(Result<AnalysisReport, String>),
    ExportFinished(Result<String, String>),
    ResultFilesLoaded(Result<Vec<FileEntry>, String>),
    DownloadFinished(Result<PathBuf, String>),
    PdfUploaded(Result<String, String>),
    ExtractionStarted { task_id: TaskId },
    ExtractionFailed(String),
    TaskProgress {
        task_id: TaskId,
        snapshot: TaskSnapshot,
    },
    TaskFinished {
        task_id: TaskId,
        outcome: TaskOutcome,
    },
    PdfUploadsLoaded(Result<Vec<FileEntry>, String>),
    ExtractedFilesLoaded(Result<Vec<ExtractedFolder>, String>),
    PdfChecked(Result<PdfAvailability, String>),
}
