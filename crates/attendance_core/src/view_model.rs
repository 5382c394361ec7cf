use crate::{
    AnalysisSummary, AttendanceRecord, CreatedFile, ExtractedFolder, FileEntry, LogEvent, TaskId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Analyze,
    Pdf,
    Results,
}

impl Tab {
    pub fn title(self) -> &'static str {
        match self {
            Tab::Analyze => "Attendance Analysis",
            Tab::Pdf => "Split PDF into Word",
            Tab::Results => "Results",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub title: String,
    pub percent: u8,
    pub detail: Option<String>,
}

/// Stat cards shown above the analysis table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisStats {
    pub total_persons: u64,
    pub total_missing: u64,
    pub persons_with_issues: u64,
    pub total_matched: u64,
}

impl From<AnalysisSummary> for AnalysisStats {
    fn from(summary: AnalysisSummary) -> Self {
        Self {
            total_persons: summary.total_persons,
            total_missing: summary.total_missing,
            persons_with_issues: summary.persons_with_issues,
            total_matched: summary.total_matched,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRowView {
    pub index: usize,
    pub person_name: String,
    pub date: String,
    pub weekday: String,
    pub issue: String,
    pub matched_image: Option<String>,
}

impl RecordRowView {
    pub(crate) fn from_record(index: usize, record: &AttendanceRecord) -> Self {
        Self {
            index,
            person_name: record.person_name.clone(),
            date: record.date.clone(),
            weekday: record.weekday.clone(),
            issue: record.issue_description.clone(),
            matched_image: record.matched_image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRowView {
    pub index: usize,
    pub name: String,
    pub size: String,
}

impl FileRowView {
    pub(crate) fn rows(files: &[FileEntry]) -> Vec<Self> {
        files
            .iter()
            .enumerate()
            .map(|(i, file)| Self {
                index: i + 1,
                name: file.name.clone(),
                size: format_file_size(file.size),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderView {
    pub folder: String,
    pub count: usize,
    pub files: Vec<FileRowView>,
}

impl From<&ExtractedFolder> for FolderView {
    fn from(folder: &ExtractedFolder) -> Self {
        Self {
            folder: folder.folder.clone(),
            count: folder.count,
            files: FileRowView::rows(&folder.files),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub tab: Tab,
    pub page_title: &'static str,
    pub analyze_enabled: bool,
    pub analysis_progress: Option<ProgressView>,
    pub stats: Option<AnalysisStats>,
    pub records: Vec<RecordRowView>,
    pub log: Vec<LogEvent>,
    /// Bumped each time an analysis starts and clears `log`.
    pub log_run: u64,
    pub result_files: Vec<FileRowView>,
    pub selected_pdf: Option<String>,
    pub extract_enabled: bool,
    pub tracked_task: Option<TaskId>,
    pub pdf_progress: Option<ProgressView>,
    pub created_files: Vec<CreatedFile>,
    pub pdf_uploads: Vec<FileRowView>,
    pub extracted_folders: Vec<FolderView>,
    /// True while any request or tracked job is still in flight.
    pub busy: bool,
    pub dirty: bool,
}

/// Human-readable size using 1024-based units, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    // `{}` on f64 drops trailing zeros: 1.50 -> "1.5", 2.00 -> "2".
    format!("{} {}", rounded, UNITS[unit])
}
