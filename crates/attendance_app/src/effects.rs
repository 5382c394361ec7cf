use std::time::Duration;

use attendance_core::{Effect, Msg};
use attendance_engine::{EngineEvent, EngineHandle};
use engine_logging::{engine_info, engine_warn};

/// Hands controller effects to the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RunAnalysis => {
                    engine_info!("RunAnalysis");
                    self.engine.run_analysis();
                }
                Effect::ExportWord(request) => {
                    engine_info!(
                        "ExportWord project={} month={} records={}",
                        request.project_name,
                        request.month,
                        request.records.len()
                    );
                    self.engine.export_word(request);
                }
                Effect::LoadResultFiles => self.engine.list_result_files(),
                Effect::DownloadResult { name, dest_dir } => {
                    self.engine.download_result(name, dest_dir);
                }
                Effect::UploadPdf { path } => {
                    engine_info!("UploadPdf path={}", path.display());
                    self.engine.upload_pdf(path);
                }
                Effect::StartExtraction { filename } => {
                    engine_info!("StartExtraction filename={}", filename);
                    self.engine.start_extraction(filename);
                }
                Effect::CancelTracking => self.engine.cancel_tracking(),
                Effect::LoadPdfUploads => self.engine.list_pdf_uploads(),
                Effect::LoadExtractedFiles => self.engine.list_extracted_files(),
                Effect::DownloadExtracted {
                    folder,
                    name,
                    dest_dir,
                } => self.engine.download_extracted(folder, name, dest_dir),
                Effect::CheckPdf => self.engine.check_pdf(),
            }
        }
    }

    /// Waits up to `timeout` for the next engine event.
    pub fn next_msg(&self, timeout: Duration) -> Option<Msg> {
        self.engine.recv_timeout(timeout).map(map_event)
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Log(event) => Msg::LogReceived(event),
        EngineEvent::AnalysisFinished(result) => Msg::AnalysisFinished(stringify(result)),
        EngineEvent::ExportFinished(result) => Msg::ExportFinished(stringify(result)),
        EngineEvent::ResultFilesLoaded(result) => {
            Msg::ResultFilesLoaded(logged("result files", stringify(result)))
        }
        EngineEvent::Downloaded(result) => Msg::DownloadFinished(stringify(result)),
        EngineEvent::PdfChecked(result) => Msg::PdfChecked(stringify(result)),
        EngineEvent::PdfUploaded(result) => Msg::PdfUploaded(stringify(result)),
        EngineEvent::ExtractionStarted { task_id } => Msg::ExtractionStarted { task_id },
        EngineEvent::ExtractionFailed(error) => {
            engine_warn!("Extraction did not start: {}", error);
            Msg::ExtractionFailed(error)
        }
        EngineEvent::TaskProgress { task_id, snapshot } => Msg::TaskProgress { task_id, snapshot },
        EngineEvent::TaskFinished { task_id, outcome } => Msg::TaskFinished { task_id, outcome },
        EngineEvent::PdfUploadsLoaded(result) => {
            Msg::PdfUploadsLoaded(logged("uploaded PDFs", stringify(result)))
        }
        EngineEvent::ExtractedFilesLoaded(result) => {
            Msg::ExtractedFilesLoaded(logged("extracted files", stringify(result)))
        }
    }
}

fn stringify<T>(result: Result<T, attendance_engine::ApiError>) -> Result<T, String> {
    result.map_err(|err| err.to_string())
}

/// Listing failures never reach the user, only the log.
fn logged<T>(what: &str, result: Result<T, String>) -> Result<T, String> {
    if let Err(error) = &result {
        engine_warn!("Could not load {}: {}", what, error);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_core::{LogEvent, TaskId, TaskOutcome};
    use attendance_engine::ApiError;
    use pretty_assertions::assert_eq;

    #[test]
    fn api_errors_become_display_text() {
        let msg = map_event(EngineEvent::ExportFinished(Err(ApiError::Server {
            status: None,
            message: "No data".into(),
        })));
        assert_eq!(msg, Msg::ExportFinished(Err("No data".into())));

        let msg = map_event(EngineEvent::AnalysisFinished(Err(ApiError::Timeout)));
        assert_eq!(msg, Msg::AnalysisFinished(Err("request timed out".into())));
    }

    #[test]
    fn task_events_pass_through() {
        let msg = map_event(EngineEvent::TaskFinished {
            task_id: TaskId::new("t"),
            outcome: TaskOutcome::Cancelled,
        });
        assert_eq!(
            msg,
            Msg::TaskFinished {
                task_id: TaskId::new("t"),
                outcome: TaskOutcome::Cancelled
            }
        );
        assert_eq!(
            map_event(EngineEvent::Log(LogEvent::info("hi"))),
            Msg::LogReceived(LogEvent::info("hi"))
        );
    }
}
