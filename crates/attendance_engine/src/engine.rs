use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use attendance_core::ExportRequest;
use engine_logging::{engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::persist::DownloadWriter;
use crate::tracker::{ChannelProgressSink, TaskTracker};
use crate::{ApiClient, ApiError, ClientSettings, EngineEvent, LogStreamRelay, ReqwestApi};

enum EngineCommand {
    RunAnalysis,
    ExportWord(ExportRequest),
    ListResultFiles,
    DownloadResult { name: String, dest_dir: PathBuf },
    CheckPdf,
    UploadPdf { path: PathBuf },
    StartExtraction { filename: String },
    CancelTracking,
    ListPdfUploads,
    ListExtractedFiles,
    DownloadExtracted {
        folder: String,
        name: String,
        dest_dir: PathBuf,
    },
}

/// The single extraction job the engine is allowed to track.
#[derive(Default)]
struct TaskSlot {
    active: Mutex<Option<CancellationToken>>,
}

impl TaskSlot {
    /// Reserves the slot, or returns `None` while another job holds it.
    fn claim(self: &Arc<Self>) -> Option<TaskClaim> {
        let mut active = self.lock();
        if active.is_some() {
            return None;
        }
        let cancel = CancellationToken::new();
        *active = Some(cancel.clone());
        Some(TaskClaim {
            slot: Arc::clone(self),
            cancel,
        })
    }

    fn cancel(&self) -> bool {
        match self.lock().as_ref() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frees the slot when dropped.
struct TaskClaim {
    slot: Arc<TaskSlot>,
    cancel: CancellationToken,
}

impl Drop for TaskClaim {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

struct EngineContext {
    api: Arc<dyn ApiClient>,
    relay: LogStreamRelay,
    tracker: TaskTracker,
    tasks: Arc<TaskSlot>,
}

/// Runs server calls on a background tokio runtime.
///
/// Commands are fire-and-forget; results come back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let api: Arc<dyn ApiClient> = Arc::new(ReqwestApi::new(&settings)?);
        let context = Arc::new(EngineContext {
            relay: LogStreamRelay::new(&settings)?,
            tracker: TaskTracker::new(Arc::clone(&api), settings.tracker.clone()),
            tasks: Arc::new(TaskSlot::default()),
            api,
        });
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|err| ApiError::Io(format!("tokio runtime: {err}")))?;

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                let context = Arc::clone(&context);
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(&context, command, event_tx).await;
                });
            }
        });

        engine_info!("Engine started for {}", settings.base_url);
        Ok(Self { cmd_tx, event_rx })
    }

    /// Runs the analysis with the log stream open for exactly its duration.
    pub fn run_analysis(&self) {
        self.send(EngineCommand::RunAnalysis);
    }

    pub fn export_word(&self, request: ExportRequest) {
        self.send(EngineCommand::ExportWord(request));
    }

    pub fn list_result_files(&self) {
        self.send(EngineCommand::ListResultFiles);
    }

    pub fn download_result(&self, name: impl Into<String>, dest_dir: impl Into<PathBuf>) {
        self.send(EngineCommand::DownloadResult {
            name: name.into(),
            dest_dir: dest_dir.into(),
        });
    }

    pub fn check_pdf(&self) {
        self.send(EngineCommand::CheckPdf);
    }

    pub fn upload_pdf(&self, path: impl Into<PathBuf>) {
        self.send(EngineCommand::UploadPdf { path: path.into() });
    }

    /// Starts an extraction job and tracks it until it completes or fails.
    pub fn start_extraction(&self, filename: impl Into<String>) {
        self.send(EngineCommand::StartExtraction {
            filename: filename.into(),
        });
    }

    /// Stops tracking the current job. The server-side job keeps running.
    pub fn cancel_tracking(&self) {
        self.send(EngineCommand::CancelTracking);
    }

    pub fn list_pdf_uploads(&self) {
        self.send(EngineCommand::ListPdfUploads);
    }

    pub fn list_extracted_files(&self) {
        self.send(EngineCommand::ListExtractedFiles);
    }

    pub fn download_extracted(
        &self,
        folder: impl Into<String>,
        name: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
    ) {
        self.send(EngineCommand::DownloadExtracted {
            folder: folder.into(),
            name: name.into(),
            dest_dir: dest_dir.into(),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            engine_warn!("Engine thread is gone; command dropped");
        }
    }
}

async fn handle_command(
    context: &EngineContext,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let event = match command {
        EngineCommand::RunAnalysis => {
            let mut logs = context.relay.start().await;
            let stream = logs.id();
            let log_tx = event_tx.clone();
            let forward = tokio::spawn(async move {
                while let Some(event) = logs.next_event().await {
                    let _ = log_tx.send(EngineEvent::Log(event));
                }
            });

            let result = context.api.analyze_full().await;
            // A newer analysis may own the connection by now; leave it open.
            if !context.relay.stop_stream(stream) {
                engine_info!("Log stream already taken over by a newer analysis");
            }
            // Lines received before the close still go out ahead of the result.
            let _ = forward.await;
            EngineEvent::AnalysisFinished(result)
        }
        EngineCommand::ExportWord(request) => {
            EngineEvent::ExportFinished(context.api.export_word(&request).await)
        }
        EngineCommand::ListResultFiles => {
            EngineEvent::ResultFilesLoaded(context.api.list_result_files().await)
        }
        EngineCommand::DownloadResult { name, dest_dir } => {
            let result = match context.api.download_result(&name).await {
                Ok(content) => save(&dest_dir, &name, &content),
                Err(err) => Err(err),
            };
            EngineEvent::Downloaded(result)
        }
        EngineCommand::CheckPdf => EngineEvent::PdfChecked(context.api.pdf_check().await),
        EngineCommand::UploadPdf { path } => {
            EngineEvent::PdfUploaded(context.api.upload_pdf(&path).await)
        }
        EngineCommand::StartExtraction { filename } => {
            match extract(context, &filename, &event_tx).await {
                Some(event) => event,
                None => return,
            }
        }
        EngineCommand::CancelTracking => {
            if !context.tasks.cancel() {
                engine_info!("Cancel requested but no extraction is tracked");
            }
            return;
        }
        EngineCommand::ListPdfUploads => {
            EngineEvent::PdfUploadsLoaded(context.api.list_pdf_uploads().await)
        }
        EngineCommand::ListExtractedFiles => {
            EngineEvent::ExtractedFilesLoaded(context.api.list_extracted_files().await)
        }
        EngineCommand::DownloadExtracted {
            folder,
            name,
            dest_dir,
        } => {
            let result = match context.api.download_extracted(&folder, &name).await {
                Ok(content) => save(&dest_dir, &name, &content),
                Err(err) => Err(err),
            };
            EngineEvent::Downloaded(result)
        }
    };
    let _ = event_tx.send(event);
}

/// Starts the job and tracks it; returns the final event to send.
async fn extract(
    context: &EngineContext,
    filename: &str,
    event_tx: &mpsc::Sender<EngineEvent>,
) -> Option<EngineEvent> {
    let Some(claim) = context.tasks.claim() else {
        engine_warn!("Extraction of {} refused: another job is tracked", filename);
        return Some(EngineEvent::ExtractionFailed(
            "Another extraction is already in progress".to_string(),
        ));
    };

    let task_id = match context.api.start_extraction(filename).await {
        Ok(task_id) => task_id,
        Err(err) => return Some(EngineEvent::ExtractionFailed(err.to_string())),
    };
    engine_info!("Extraction of {} started as task {}", filename, task_id);
    if event_tx
        .send(EngineEvent::ExtractionStarted {
            task_id: task_id.clone(),
        })
        .is_err()
    {
        return None;
    }

    let sink = ChannelProgressSink::new(event_tx.clone());
    let outcome = context.tracker.track(&task_id, &claim.cancel, &sink).await;
    // Free the slot before the controller hears about the end.
    drop(claim);
    Some(EngineEvent::TaskFinished { task_id, outcome })
}

fn save(dest_dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf, ApiError> {
    let path = DownloadWriter::new(dest_dir).write(name, content)?;
    engine_info!("Saved {} ({} bytes)", path.display(), content.len());
    Ok(path)
}
