//! Polling Task Tracker: follows one server-side extraction job to a terminal state.
use std::sync::Arc;
use std::time::Duration;

use attendance_core::{TaskId, TaskOutcome, TaskSnapshot, TaskStatus};
use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::{ApiClient, ApiError, EngineEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Delay before the next poll after a non-terminal snapshot.
    pub poll_interval: Duration,
    /// Delay before retrying after the status query itself failed.
    pub retry_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Query again after the delay.
    Poll(Duration),
    Finish(TaskOutcome),
}

/// Decides what follows one status query.
pub fn next_step(result: &Result<TaskSnapshot, ApiError>, settings: &TrackerSettings) -> PollStep {
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(_) => return PollStep::Poll(settings.retry_interval),
    };
    match snapshot.status {
        TaskStatus::Completed => PollStep::Finish(TaskOutcome::Completed {
            files: snapshot.files_created.clone(),
        }),
        TaskStatus::Error => {
            let error = snapshot
                .error
                .clone()
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| snapshot.message.clone());
            PollStep::Finish(TaskOutcome::Failed { error })
        }
        TaskStatus::Pending | TaskStatus::Running | TaskStatus::Other(_) => {
            PollStep::Poll(settings.poll_interval)
        }
    }
}

/// Receives engine events as they happen.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

pub struct TaskTracker {
    api: Arc<dyn ApiClient>,
    settings: TrackerSettings,
}

impl TaskTracker {
    pub fn new(api: Arc<dyn ApiClient>, settings: TrackerSettings) -> Self {
        Self { api, settings }
    }

    /// Polls `task_id` until the job completes or fails.
    ///
    /// Every successful query is emitted as [`EngineEvent::TaskProgress`].
    /// Failed queries are retried; only `cancel` ends tracking early.
    pub async fn track(
        &self,
        task_id: &TaskId,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> TaskOutcome {
        engine_info!("Tracking extraction task {}", task_id);
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return cancelled(task_id),
                result = self.api.task_status(task_id) => result,
            };

            match &result {
                Ok(snapshot) => sink.emit(EngineEvent::TaskProgress {
                    task_id: task_id.clone(),
                    snapshot: snapshot.clone(),
                }),
                Err(err) => engine_warn!("Status query for task {} failed: {}", task_id, err),
            }

            match next_step(&result, &self.settings) {
                PollStep::Finish(outcome) => {
                    engine_info!("Task {} finished: {:?}", task_id, outcome);
                    return outcome;
                }
                PollStep::Poll(delay) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return cancelled(task_id),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

fn cancelled(task_id: &TaskId) -> TaskOutcome {
    engine_debug!("Stopped tracking task {}", task_id);
    TaskOutcome::Cancelled
}
