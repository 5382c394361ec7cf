use std::path::Path;

use crate::view_model::{Tab, ToastKind};
use crate::{AppState, Effect, ExportRequest, LogCategory, LogEvent, Msg, TaskOutcome};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::TabSelected(tab) => {
            state.set_tab(tab);
            match tab {
                Tab::Analyze => Vec::new(),
                Tab::Results => vec![Effect::LoadResultFiles],
                Tab::Pdf => vec![Effect::LoadPdfUploads, Effect::LoadExtractedFiles],
            }
        }
        Msg::AnalyzeClicked => {
            if state.analysis_running() {
                return (state, Vec::new());
            }
            state.begin_analysis();
            state.push_log(LogEvent::info("Starting analysis..."));
            state.set_analysis_progress("Analyzing missing days...", 30);
            vec![Effect::RunAnalysis]
        }
        Msg::LogReceived(event) => {
            state.push_log(event);
            Vec::new()
        }
        Msg::AnalysisFinished(Ok(report)) => {
            let missing = report.summary.total_missing;
            let matched = report.summary.total_matched;
            state.finish_analysis(Some(report));
            state.set_analysis_progress("Done!", 100);
            state.push_log(LogEvent::new(
                LogCategory::Success,
                format!("Done! Found {missing} missing records, matched {matched} images"),
            ));
            state.toast(
                ToastKind::Success,
                format!("Found {missing} missing records"),
            );
            Vec::new()
        }
        Msg::AnalysisFinished(Err(error)) => {
            state.finish_analysis(None);
            state.clear_analysis_progress();
            state.push_log(LogEvent::new(LogCategory::Error, format!("Error: {error}")));
            state.toast(ToastKind::Error, error);
            Vec::new()
        }
        Msg::ExportClicked {
            project_name,
            month,
        } => {
            let Some(report) = state.report() else {
                state.toast(ToastKind::Warning, "Run an analysis first");
                return (state, Vec::new());
            };
            let request = ExportRequest {
                project_name: project_name.trim().to_string(),
                month: month.trim().to_string(),
                records: report.records.clone(),
            };
            state.toast(ToastKind::Info, "Exporting Word file...");
            vec![Effect::ExportWord(request)]
        }
        Msg::ExportFinished(result) => {
            state.request_settled();
            match result {
                Ok(filename) => {
                    state.toast(ToastKind::Success, format!("Exported file: {filename}"));
                    vec![Effect::LoadResultFiles]
                }
                Err(error) => {
                    state.toast(ToastKind::Error, error);
                    Vec::new()
                }
            }
        }
        Msg::RefreshClicked => {
            state.start_refresh();
            state.toast(ToastKind::Info, "Refreshing...");
            vec![Effect::LoadResultFiles]
        }
        Msg::ResultFilesLoaded(result) => {
            state.request_settled();
            // Listing failures are only logged by the effect runner.
            if let Ok(files) = result {
                state.set_result_files(files);
            }
            if state.take_refresh() {
                state.toast(ToastKind::Success, "Data refreshed");
            }
            Vec::new()
        }
        Msg::DownloadResultClicked { name, dest_dir } => {
            vec![Effect::DownloadResult { name, dest_dir }]
        }
        Msg::DownloadExtractedClicked {
            folder,
            name,
            dest_dir,
        } => vec![Effect::DownloadExtracted {
            folder,
            name,
            dest_dir,
        }],
        Msg::DownloadFinished(result) => {
            state.request_settled();
            match result {
                Ok(path) => state.toast(ToastKind::Success, format!("Saved {}", path.display())),
                Err(error) => state.toast(ToastKind::Error, error),
            }
            Vec::new()
        }
        Msg::PdfFileChosen(path) => {
            if !is_pdf(&path) {
                state.toast(ToastKind::Warning, "Please choose a PDF file");
                return (state, Vec::new());
            }
            state.toast(ToastKind::Info, "Uploading PDF file...");
            vec![Effect::UploadPdf { path }]
        }
        Msg::PdfUploaded(result) => {
            state.request_settled();
            match result {
                Ok(filename) => {
                    state.toast(ToastKind::Success, format!("Uploaded: {filename}"));
                    state.select_pdf(filename);
                    vec![Effect::LoadPdfUploads]
                }
                Err(error) => {
                    state.toast(ToastKind::Error, error);
                    Vec::new()
                }
            }
        }
        Msg::PdfSelected(filename) => {
            state.toast(ToastKind::Info, format!("Selected: {filename}"));
            state.select_pdf(filename);
            Vec::new()
        }
        Msg::ExtractClicked => {
            let Some(filename) = state.selected_pdf().map(ToOwned::to_owned) else {
                state.toast(ToastKind::Warning, "Select a PDF file first");
                return (state, Vec::new());
            };
            if !state.extraction_idle() {
                return (state, Vec::new());
            }
            state.begin_extraction();
            vec![Effect::StartExtraction { filename }]
        }
        Msg::ExtractionStarted { task_id } => {
            if state.track_task(task_id) {
                state.toast(ToastKind::Info, "PDF extraction started...");
            }
            Vec::new()
        }
        Msg::ExtractionFailed(error) => {
            if state.abort_extraction_start() {
                state.toast(ToastKind::Error, error);
            }
            Vec::new()
        }
        Msg::TaskProgress { task_id, snapshot } => {
            if state.tracked_task() == Some(&task_id) {
                state.apply_snapshot(&snapshot);
            }
            Vec::new()
        }
        Msg::TaskFinished { task_id, outcome } => {
            if !state.release_task(&task_id) {
                return (state, Vec::new());
            }
            match outcome {
                TaskOutcome::Completed { files } => {
                    state.toast(
                        ToastKind::Success,
                        format!("Done! Created {} Word files.", files.len()),
                    );
                    state.set_created_files(files);
                    vec![Effect::LoadExtractedFiles]
                }
                TaskOutcome::Failed { error } => {
                    state.toast(ToastKind::Error, format!("Error: {error}"));
                    Vec::new()
                }
                TaskOutcome::Cancelled => {
                    state.toast(ToastKind::Warning, "Stopped tracking the extraction job");
                    Vec::new()
                }
            }
        }
        Msg::CancelExtractionClicked => {
            if state.tracked_task().is_some() {
                vec![Effect::CancelTracking]
            } else {
                Vec::new()
            }
        }
        Msg::PdfUploadsLoaded(result) => {
            state.request_settled();
            if let Ok(files) = result {
                state.set_pdf_uploads(files);
            }
            Vec::new()
        }
        Msg::ExtractedFilesLoaded(result) => {
            state.request_settled();
            if let Ok(folders) = result {
                state.set_extracted(folders);
            }
            Vec::new()
        }
        Msg::PdfCheckClicked => vec![Effect::CheckPdf],
        Msg::PdfChecked(result) => {
            state.request_settled();
            match result {
                Ok(check) if check.available => state.toast(ToastKind::Success, check.message),
                Ok(check) => state.toast(ToastKind::Warning, check.message),
                Err(error) => state.toast(ToastKind::Error, error),
            }
            Vec::new()
        }
    };

    let one_shots = effects.iter().filter(|effect| effect.is_one_shot()).count();
    if one_shots > 0 {
        state.add_in_flight(one_shots);
        state.mark_dirty();
    }

    (state, effects)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
