//! Attendance console core: domain records and the pure controller state machine.
mod effect;
mod model;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use model::{
    AnalysisReport, AnalysisSummary, AttendanceRecord, CreatedFile, ExportRequest,
    ExtractedFolder, FileEntry, LogCategory, LogEvent, PdfAvailability, TaskId, TaskOutcome,
    TaskSnapshot, TaskStatus,
};
pub use msg::Msg;
pub use state::AppState;
pub use update::update;
pub use view_model::{
    format_file_size, AnalysisStats, AppViewModel, FileRowView, FolderView, ProgressView,
    RecordRowView, Tab, Toast, ToastKind,
};
