use std::io::{self, Write};
use std::sync::mpsc;
use std::time::Duration;

use attendance_core::{update, AppState, Msg, ToastKind};
use attendance_engine::EngineHandle;
use engine_logging::engine_info;

use crate::effects::EffectRunner;
use crate::render::Renderer;

const EVENT_WAIT: Duration = Duration::from_millis(100);

/// Where a Ctrl-C aimed at the running extraction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CancelRequest {
    None,
    /// Interrupted before the server handed out a task id.
    Waiting,
    Sent,
}

/// Owns the controller state and drives it from scripted user actions and
/// engine events.
pub struct Controller {
    state: AppState,
    runner: EffectRunner,
    interrupts: Option<mpsc::Receiver<()>>,
    cancel: CancelRequest,
    failures: usize,
}

impl Controller {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            state: AppState::new(),
            runner: EffectRunner::new(engine),
            interrupts: None,
            cancel: CancelRequest::None,
            failures: 0,
        }
    }

    /// Each `()` on `interrupts` is one Ctrl-C from the user.
    ///
    /// The first stops tracking a running extraction. Any other interrupt
    /// ends [`Controller::run_script`] with [`io::ErrorKind::Interrupted`].
    pub fn with_interrupts(mut self, interrupts: mpsc::Receiver<()>) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Number of error toasts shown so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    #[cfg(test)]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Dispatches each action in turn, waiting for everything it started to
    /// settle before moving on.
    pub fn run_script<W: Write>(
        &mut self,
        script: Vec<Msg>,
        renderer: &mut Renderer<W>,
    ) -> io::Result<()> {
        self.render_if_dirty(renderer)?;
        for msg in script {
            self.dispatch(msg, renderer)?;
            self.settle(renderer)?;
        }
        Ok(())
    }

    fn settle<W: Write>(&mut self, renderer: &mut Renderer<W>) -> io::Result<()> {
        while self.state.is_busy() {
            self.handle_interrupt(renderer)?;
            if let Some(msg) = self.runner.next_msg(EVENT_WAIT) {
                self.dispatch(msg, renderer)?;
            }
        }
        self.cancel = CancelRequest::None;
        Ok(())
    }

    fn handle_interrupt<W: Write>(&mut self, renderer: &mut Renderer<W>) -> io::Result<()> {
        let interrupted = self
            .interrupts
            .as_ref()
            .is_some_and(|interrupts| interrupts.try_recv().is_ok());
        let view = self.state.view();
        if interrupted {
            if self.cancel != CancelRequest::None || view.extract_enabled {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
            }
            engine_info!("Interrupt received; cancelling extraction tracking");
            self.cancel = CancelRequest::Waiting;
        }
        if self.cancel == CancelRequest::Waiting && view.tracked_task.is_some() {
            self.cancel = CancelRequest::Sent;
            self.dispatch(Msg::CancelExtractionClicked, renderer)?;
        }
        Ok(())
    }

    fn dispatch<W: Write>(&mut self, msg: Msg, renderer: &mut Renderer<W>) -> io::Result<()> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);

        for toast in self.state.drain_toasts() {
            if toast.kind == ToastKind::Error {
                self.failures += 1;
            }
            renderer.toast(&toast)?;
        }
        self.render_if_dirty(renderer)
    }

    fn render_if_dirty<W: Write>(&mut self, renderer: &mut Renderer<W>) -> io::Result<()> {
        let view = self.state.view();
        if self.state.consume_dirty() {
            renderer.render(&view)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use attendance_core::{CreatedFile, Tab};
    use attendance_engine::{ClientSettings, TrackerSettings};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn controller_for(server: &MockServer) -> Controller {
        let engine = EngineHandle::new(ClientSettings {
            base_url: server.uri(),
            tracker: TrackerSettings {
                poll_interval: Duration::from_millis(20),
                retry_interval: Duration::from_millis(20),
            },
            ..ClientSettings::default()
        })
        .expect("engine");
        Controller::new(engine)
    }

    fn run(controller: &mut Controller, script: Vec<Msg>) -> String {
        let mut renderer = Renderer::new(Vec::new());
        tokio::task::block_in_place(|| controller.run_script(script, &mut renderer)).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    /// A controller that sees one Ctrl-C as soon as it starts waiting.
    fn interrupted_controller(server: &MockServer) -> Controller {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        controller_for(server).with_interrupts(rx)
    }

    async fn mount_listings(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/pdf/uploads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pdf/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "folders": [{
                    "folder": "report",
                    "count": 2,
                    "files": [{"name": "a.docx", "size": 1536}, {"name": "b.docx", "size": 2048}]
                }]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extraction_is_followed_to_completion() {
        let server = MockServer::start().await;
        mount_listings(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/pdf/extract"))
            .and(body_json(json!({"filename": "report.pdf"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "task_id": "abc123"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pdf/status/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "running",
                "progress": 40,
                "message": "Processing page 2",
                "current_page": 2,
                "total": 5
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pdf/status/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "progress": 100,
                "message": "Done",
                "files_created": ["a.docx", "b.docx"]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let mut controller = controller_for(&server);
        let output = run(
            &mut controller,
            vec![
                Msg::TabSelected(Tab::Pdf),
                Msg::PdfSelected("report.pdf".into()),
                Msg::ExtractClicked,
            ],
        );

        let view = controller.state().view();
        assert!(view.extract_enabled);
        assert_eq!(view.tracked_task, None);
        assert_eq!(
            view.created_files,
            vec![
                CreatedFile {
                    name: "a.docx".into(),
                    page: None
                },
                CreatedFile {
                    name: "b.docx".into(),
                    page: None
                },
            ]
        );
        assert_eq!(output.matches("Done! Created 2 Word files.").count(), 1);
        assert!(output.contains("(Page 2/5)"));
        assert!(output.contains("1.5 KB"));
        assert_eq!(controller.failures(), 0);

        let polls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == "/api/pdf/status/abc123")
            .count();
        assert_eq!(polls, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_job_is_reported_once() {
        let server = MockServer::start().await;
        mount_listings(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/pdf/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "task_id": "bad"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pdf/status/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "progress": 0,
                "error": "PDF is encrypted"
            })))
            .mount(&server)
            .await;

        let mut controller = controller_for(&server);
        let output = run(
            &mut controller,
            vec![Msg::PdfSelected("locked.pdf".into()), Msg::ExtractClicked],
        );

        assert_eq!(output.matches("Error: PDF is encrypted").count(), 1);
        assert_eq!(controller.failures(), 1);
        assert!(controller.state().view().extract_enabled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_lands_in_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files/download/report.docx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"DOCX".to_vec()))
            .mount(&server)
            .await;
        let temp = tempfile::TempDir::new().unwrap();

        let mut controller = controller_for(&server);
        let output = run(
            &mut controller,
            vec![Msg::DownloadResultClicked {
                name: "report.docx".into(),
                dest_dir: PathBuf::from(temp.path()),
            }],
        );

        assert!(output.contains("Saved"));
        assert_eq!(
            std::fs::read(temp.path().join("report.docx")).unwrap(),
            b"DOCX"
        );
        assert!(!controller.state().is_busy());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_stops_tracking_the_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/pdf/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "task_id": "slow"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pdf/status/slow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "running",
                "progress": 10
            })))
            .mount(&server)
            .await;

        let mut controller = interrupted_controller(&server);
        let output = run(
            &mut controller,
            vec![Msg::PdfSelected("big.pdf".into()), Msg::ExtractClicked],
        );

        assert!(output.contains("Stopped tracking the extraction job"));
        let view = controller.state().view();
        assert!(view.extract_enabled);
        assert_eq!(view.tracked_task, None);
        assert_eq!(controller.failures(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_without_extraction_ends_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files/results"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"files": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut controller = interrupted_controller(&server);
        let mut renderer = Renderer::new(Vec::new());
        let result = tokio::task::block_in_place(|| {
            controller.run_script(vec![Msg::TabSelected(Tab::Results)], &mut renderer)
        });

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::Interrupted);
    }
}
