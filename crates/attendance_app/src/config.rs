//! Optional RON settings file.
//!
//! ```ron
//! (
//!     server: Some("http://10.0.0.5:5000"),
//!     request_timeout_secs: Some(900),
//!     poll_interval_ms: Some(1000),
//!     download_dir: Some("downloads"),
//! )
//! ```
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use attendance_engine::ClientSettings;
use engine_logging::engine_info;
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "attendance.ron";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub retry_interval_ms: Option<u64>,
    pub download_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Overrides the defaults in `settings` with whatever the file sets.
    pub fn apply(&self, settings: &mut ClientSettings) {
        if let Some(server) = &self.server {
            settings.base_url = server.clone();
        }
        if let Some(secs) = self.connect_timeout_secs {
            settings.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.poll_interval_ms {
            settings.tracker.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_interval_ms {
            settings.tracker.retry_interval = Duration::from_millis(ms);
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Reads `explicit`, or the default file if present.
///
/// A missing explicit file is an error; a missing default file is not.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !path.exists() {
                return Ok(FileConfig::default());
            }
            path
        }
    };
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = parse(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    engine_info!("Loaded settings from {}", path.display());
    Ok(config)
}

fn parse(content: &str) -> anyhow::Result<FileConfig> {
    Ok(ron::from_str(content)?)
}
