use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("download directory missing or not writable: {0}")]
    TargetDir(String),
    #[error("refusing to write file named {0:?}")]
    InvalidName(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the download directory exists; create it if missing.
pub fn ensure_target_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::TargetDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::TargetDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::TargetDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes downloaded documents into one directory, all-or-nothing.
pub struct DownloadWriter {
    dir: PathBuf,
}

impl DownloadWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `content` to `{dir}/{filename}` through a temp file and a rename,
    /// replacing any previous download of the same name.
    ///
    /// Names come from the server, so anything that could leave `dir` is refused.
    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        if !is_plain_file_name(filename) {
            return Err(PersistError::InvalidName(filename.to_string()));
        }
        ensure_target_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}
