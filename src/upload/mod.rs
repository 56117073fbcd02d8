mod client;
pub mod progress;
mod types;

pub use client::UploadClient;
pub use types::{
    EventSink, FileSource, SelectedFile, UploadError, ValidationError, WorkerEvent,
};

#[cfg(test)]
pub use types::{ProtocolError, TransportError};
