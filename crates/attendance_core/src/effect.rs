use std::path::PathBuf;

/// IO requested by [`crate::update`] and carried out by the engine.
///
/// `RunAnalysis` covers the log stream too: the engine opens the relay before
/// the request and closes it once the request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RunAnalysis,
    ExportWord(crate::ExportRequest),
    LoadResultFiles,
    DownloadResult {
        name: String,
        dest_dir: PathBuf,
    },
    UploadPdf {
        path: PathBuf,
    },
    StartExtraction {
        filename: String,
    },
    CancelTracking,
    LoadPdfUploads,
    LoadExtractedFiles,
    DownloadExtracted {
        folder: String,
        name: String,
        dest_dir: PathBuf,
    },
    CheckPdf,
}

impl Effect {
    /// One-shot requests answered by exactly one result message.
    pub(crate) fn is_one_shot(&self) -> bool {
        !matches!(
            self,
            Effect::RunAnalysis | Effect::StartExtraction { .. } | Effect::CancelTracking
        )
    }
}
