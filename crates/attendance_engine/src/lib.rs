//! Attendance engine: HTTP client, extraction tracking and log streaming.
mod api;
mod engine;
mod error;
mod log_stream;
mod persist;
mod tracker;
mod types;

pub use api::{ApiClient, ClientSettings, ReqwestApi};
pub use engine::EngineHandle;
pub use error::ApiError;
pub use log_stream::{
    parse_payload, LogEventStream, LogStreamRelay, SseDecoder, StreamId, CONNECTED_MESSAGE,
};
pub use persist::{ensure_target_dir, DownloadWriter, PersistError};
pub use tracker::{next_step, ChannelProgressSink, PollStep, ProgressSink, TaskTracker, TrackerSettings};
pub use types::EngineEvent;
