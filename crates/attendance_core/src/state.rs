use crate::view_model::{
    AnalysisStats, AppViewModel, FileRowView, FolderView, ProgressView, RecordRowView, Tab, Toast,
    ToastKind,
};
use crate::{
    AnalysisReport, CreatedFile, ExtractedFolder, FileEntry, LogEvent, TaskId, TaskSnapshot,
};

/// Where the single extraction job currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum Extraction {
    #[default]
    Idle,
    /// Start request sent, no handle yet.
    Starting,
    Tracking(TaskId),
}

/// Controller state for one session.
///
/// Holds what the browser kept in globals: the tracked task handle, the last
/// Analysis Result Set and the selected upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    tab: Tab,
    analysis_running: bool,
    analysis_progress: Option<ProgressView>,
    report: Option<AnalysisReport>,
    log: Vec<LogEvent>,
    analysis_runs: u64,
    toasts: Vec<Toast>,
    result_files: Vec<FileEntry>,
    refresh_pending: bool,
    selected_pdf: Option<String>,
    extraction: Extraction,
    pdf_progress: Option<ProgressView>,
    created_files: Vec<CreatedFile>,
    pdf_uploads: Vec<FileEntry>,
    extracted: Vec<ExtractedFolder>,
    in_flight: usize,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let records = self
            .report
            .as_ref()
            .map(|report| {
                report
                    .records
                    .iter()
                    .enumerate()
                    .map(|(i, record)| RecordRowView::from_record(i + 1, record))
                    .collect()
            })
            .unwrap_or_default();

        AppViewModel {
            tab: self.tab,
            page_title: self.tab.title(),
            analyze_enabled: !self.analysis_running,
            analysis_progress: self.analysis_progress.clone(),
            stats: self
                .report
                .as_ref()
                .map(|report| AnalysisStats::from(report.summary)),
            records,
            log: self.log.clone(),
            log_run: self.analysis_runs,
            result_files: FileRowView::rows(&self.result_files),
            selected_pdf: self.selected_pdf.clone(),
            extract_enabled: self.extraction == Extraction::Idle,
            tracked_task: self.tracked_task().cloned(),
            pdf_progress: self.pdf_progress.clone(),
            created_files: self.created_files.clone(),
            pdf_uploads: FileRowView::rows(&self.pdf_uploads),
            extracted_folders: self.extracted.iter().map(FolderView::from).collect(),
            busy: self.is_busy(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Hands pending toasts to the renderer.
    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    pub fn is_busy(&self) -> bool {
        self.analysis_running || self.extraction != Extraction::Idle || self.in_flight > 0
    }

    pub fn tracked_task(&self) -> Option<&TaskId> {
        match &self.extraction {
            Extraction::Tracking(task_id) => Some(task_id),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn toast(&mut self, kind: ToastKind, text: impl Into<String>) {
        self.toasts.push(Toast {
            kind,
            text: text.into(),
        });
        self.dirty = true;
    }

    pub(crate) fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.dirty = true;
    }

    pub(crate) fn add_in_flight(&mut self, count: usize) {
        self.in_flight += count;
    }

    pub(crate) fn request_settled(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.dirty = true;
    }

    // Analysis

    pub(crate) fn analysis_running(&self) -> bool {
        self.analysis_running
    }

    /// Clears the log and disables the analyze control for a new run.
    pub(crate) fn begin_analysis(&mut self) {
        self.analysis_running = true;
        self.analysis_runs += 1;
        self.log.clear();
        self.dirty = true;
    }

    pub(crate) fn finish_analysis(&mut self, report: Option<AnalysisReport>) {
        self.analysis_running = false;
        if let Some(report) = report {
            self.report = Some(report);
        }
        self.dirty = true;
    }

    pub(crate) fn set_analysis_progress(&mut self, title: impl Into<String>, percent: u8) {
        self.analysis_progress = Some(ProgressView {
            title: title.into(),
            percent,
            detail: None,
        });
        self.dirty = true;
    }

    pub(crate) fn clear_analysis_progress(&mut self) {
        self.analysis_progress = None;
        self.dirty = true;
    }

    pub(crate) fn push_log(&mut self, event: LogEvent) {
        self.log.push(event);
        self.dirty = true;
    }

    // Result files

    pub(crate) fn set_result_files(&mut self, files: Vec<FileEntry>) {
        self.result_files = files;
        self.dirty = true;
    }

    pub(crate) fn start_refresh(&mut self) {
        self.refresh_pending = true;
    }

    pub(crate) fn take_refresh(&mut self) -> bool {
        std::mem::take(&mut self.refresh_pending)
    }

    // PDF extraction

    pub(crate) fn selected_pdf(&self) -> Option<&str> {
        self.selected_pdf.as_deref()
    }

    pub(crate) fn select_pdf(&mut self, filename: String) {
        self.selected_pdf = Some(filename);
        self.dirty = true;
    }

    pub(crate) fn extraction_idle(&self) -> bool {
        self.extraction == Extraction::Idle
    }

    pub(crate) fn begin_extraction(&mut self) {
        self.extraction = Extraction::Starting;
        self.created_files.clear();
        self.pdf_progress = Some(ProgressView {
            title: "Starting extraction...".to_string(),
            percent: 0,
            detail: None,
        });
        self.dirty = true;
    }

    /// Records the handle of the job the server just started.
    ///
    /// Returns false when no start request is pending.
    pub(crate) fn track_task(&mut self, task_id: TaskId) -> bool {
        if self.extraction != Extraction::Starting {
            return false;
        }
        self.extraction = Extraction::Tracking(task_id);
        self.dirty = true;
        true
    }

    /// Re-enables the extract control after a failed start request.
    pub(crate) fn abort_extraction_start(&mut self) -> bool {
        if self.extraction != Extraction::Starting {
            return false;
        }
        self.extraction = Extraction::Idle;
        self.pdf_progress = None;
        self.dirty = true;
        true
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: &TaskSnapshot) {
        let title = if snapshot.message.is_empty() {
            "Processing...".to_string()
        } else {
            snapshot.message.clone()
        };
        self.pdf_progress = Some(ProgressView {
            title,
            percent: snapshot.progress,
            detail: snapshot
                .page_counter()
                .map(|(current, total)| format!("Page {current}/{total}")),
        });
        self.dirty = true;
    }

    /// Stops tracking `task_id` and re-enables the extract control.
    ///
    /// Returns false if `task_id` is not the tracked job, so a terminal state
    /// is applied at most once.
    pub(crate) fn release_task(&mut self, task_id: &TaskId) -> bool {
        if self.tracked_task() != Some(task_id) {
            return false;
        }
        self.extraction = Extraction::Idle;
        self.dirty = true;
        true
    }

    pub(crate) fn set_created_files(&mut self, files: Vec<CreatedFile>) {
        self.created_files = files;
        self.dirty = true;
    }

    pub(crate) fn set_pdf_uploads(&mut self, files: Vec<FileEntry>) {
        self.pdf_uploads = files;
        self.dirty = true;
    }

    pub(crate) fn set_extracted(&mut self, folders: Vec<ExtractedFolder>) {
        self.extracted = folders;
        self.dirty = true;
    }
}
