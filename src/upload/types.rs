use crate::utils::mime::{declared_mime, is_video_mime};
use bytes::Bytes;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use thiserror::Error;

/// Where the selected file's bytes live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let metadata = fs::metadata(path).map_err(|e| ValidationError::Read(e.to_string()))?;
        if !metadata.is_file() {
            return Err(ValidationError::Read(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            mime: declared_mime(&name).to_string(),
            name,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn is_video(&self) -> bool {
        is_video_mime(&self.mime)
    }
}

/// Body returned by `POST /upload`.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "downloadUrl")]
    pub download_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a video file.")]
    NotAVideo { mime: String },
    #[error("An upload is already in progress.")]
    UploadInProgress,
    #[error("Failed to read file: {0}")]
    Read(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(String),
    #[error("Upload failed with status {0}")]
    Status(u16),
    #[error("Failed to read file: {0}")]
    Read(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid server response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Server(String),
    #[error("Server response did not include a download URL")]
    MissingDownloadUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download URL {href}: {reason}")]
    InvalidUrl { href: String, reason: String },
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Messages from background tasks to the UI thread.
#[derive(Debug)]
pub enum WorkerEvent {
    UploadProgress {
        attempt: u64,
        sent: u64,
        total: u64,
    },
    UploadFinished {
        attempt: u64,
        result: Result<String, UploadError>,
    },
    DownloadFinished {
        attempt: u64,
        result: Result<PathBuf, String>,
    },
}

/// Sending half of the worker channel, plus a hook that wakes the UI so the
/// event is picked up without waiting for the next input.
#[derive(Clone)]
pub struct EventSink {
    sender: Sender<WorkerEvent>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl EventSink {
    #[cfg(test)]
    pub fn new(sender: Sender<WorkerEvent>) -> Self {
        Self {
            sender,
            wake: Arc::new(|| {}),
        }
    }

    pub fn with_wake(sender: Sender<WorkerEvent>, wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            sender,
            wake: Arc::new(wake),
        }
    }

    pub fn send(&self, event: WorkerEvent) {
        if self.sender.send(event).is_ok() {
            (self.wake)();
        }
    }
}
