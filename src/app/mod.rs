mod state;
mod ui;

use crate::config::AppConfig;
use crate::upload::{EventSink, SelectedFile, UploadClient, WorkerEvent};
use crate::utils::mime::{declared_mime, video_extensions};
use bytes::Bytes;
use eframe::{egui, App};
pub use state::{DownloadLink, StatusKind, UploadState, UploadTicket};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// What a drop resolves to before validation.
#[derive(Debug)]
enum DroppedInput {
    Path(PathBuf),
    Memory(SelectedFile),
}

/// Only the first dropped file is considered. Native drops carry a path,
/// drops without one fall back to the bytes egui read for us.
fn first_dropped(files: &[egui::DroppedFile]) -> Option<DroppedInput> {
    let dropped = files.first()?;
    if files.len() > 1 {
        debug!(ignored = files.len() - 1, "extra dropped files ignored");
    }

    if let Some(path) = &dropped.path {
        Some(DroppedInput::Path(path.clone()))
    } else if let Some(bytes) = &dropped.bytes {
        Some(DroppedInput::Memory(SelectedFile::from_bytes(
            dropped.name.clone(),
            declared_mime(&dropped.name),
            Bytes::copy_from_slice(bytes),
        )))
    } else {
        warn!(name = %dropped.name, "dropped file carried neither a path nor bytes");
        None
    }
}

pub struct BlurUploader {
    state: UploadState,
    client: UploadClient,
    runtime: Runtime,
    sender: std_mpsc::Sender<WorkerEvent>,
    receiver: std_mpsc::Receiver<WorkerEvent>,
    server_url: String,
    drop_hover: bool,
}

impl BlurUploader {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        client: UploadClient,
        runtime: Runtime,
    ) -> Self {
        info!(upload_url = %client.upload_url(), "initializing video blur uploader");
        let (sender, receiver) = std_mpsc::channel();
        Self {
            state: UploadState::new(config.timings.clone()),
            client,
            runtime,
            sender,
            receiver,
            server_url: config.server_url,
            drop_hover: false,
        }
    }

    fn event_sink(&self, ctx: &egui::Context) -> EventSink {
        let ctx = ctx.clone();
        EventSink::with_wake(self.sender.clone(), move || ctx.request_repaint())
    }

    /// Shared by the drop zone and the "Select Video" button.
    pub fn open_file_dialog(&mut self, ctx: &egui::Context) {
        let video_exts = video_extensions();
        let picked = rfd::FileDialog::new()
            .set_title("Select a video")
            .add_filter("Video", video_exts.as_slice())
            .add_filter("All files", &["*"])
            .pick_file();

        match picked {
            Some(path) => self.handle_path(ctx, &path),
            None => debug!("file dialog dismissed"),
        }
    }

    fn handle_path(&mut self, ctx: &egui::Context, path: &Path) {
        match SelectedFile::from_path(path) {
            Ok(file) => self.handle_file(ctx, file),
            Err(e) => self.state.reject_selection(&e),
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let (hovering, dropped) = ctx.input(|i| {
            (
                !i.raw.hovered_files.is_empty(),
                first_dropped(&i.raw.dropped_files),
            )
        });
        self.drop_hover = hovering;

        match dropped {
            Some(DroppedInput::Path(path)) => {
                debug!(path = %path.display(), "file dropped");
                self.handle_path(ctx, &path);
            }
            Some(DroppedInput::Memory(file)) => {
                debug!(name = %file.name, "file dropped without a path");
                self.handle_file(ctx, file);
            }
            None => {}
        }
    }

    fn handle_file(&mut self, ctx: &egui::Context, file: SelectedFile) {
        match self.state.select_file(file, Instant::now()) {
            Ok(ticket) => self.spawn_upload(ctx, ticket),
            Err(e) => debug!("selection not uploaded: {}", e),
        }
    }

    fn spawn_upload(&self, ctx: &egui::Context, ticket: UploadTicket) {
        let client = self.client.clone();
        let sink = self.event_sink(ctx);

        self.runtime.spawn(async move {
            let result = client.upload(ticket.attempt, &ticket.file, &sink).await;
            sink.send(WorkerEvent::UploadFinished {
                attempt: ticket.attempt,
                result,
            });
        });
    }

    /// Asks where to save the processed video, then fetches it in the
    /// background.
    pub fn start_download(&mut self, ctx: &egui::Context, link: &DownloadLink) {
        let Some(dest) = rfd::FileDialog::new()
            .set_title("Save blurred video")
            .set_file_name(link.file_name.as_str())
            .save_file()
        else {
            debug!("save dialog dismissed");
            return;
        };

        self.state.download_started(&dest);
        let client = self.client.clone();
        let sink = self.event_sink(ctx);
        let attempt = self.state.attempt();
        let href = link.href.clone();

        self.runtime.spawn(async move {
            let result = client
                .download(&href, &dest)
                .await
                .map(|_| dest)
                .map_err(|e| {
                    warn!("download failed: {}", e);
                    e.to_string()
                });
            sink.send(WorkerEvent::DownloadFinished { attempt, result });
        });
    }

    pub fn play_preview(&self) {
        let Some(path) = self.state.preview().and_then(|p| p.local_path()) else {
            return;
        };
        if let Err(e) = open::that(path) {
            warn!(path = %path.display(), "failed to open preview: {}", e);
        }
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        let now = Instant::now();

        while let Ok(event) = self.receiver.try_recv() {
            match event {
                WorkerEvent::UploadProgress {
                    attempt,
                    sent,
                    total,
                } => self.state.on_upload_progress(attempt, sent, total, now),
                WorkerEvent::UploadFinished { attempt, result } => {
                    self.state.on_upload_finished(attempt, result, now)
                }
                WorkerEvent::DownloadFinished { attempt, result } => {
                    self.state.on_download_finished(attempt, result)
                }
            }
        }

        if let Some(deadline) = self.state.poll(now) {
            ctx.request_repaint_after(deadline.saturating_duration_since(now));
        }
    }
}

impl App for BlurUploader {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.handle_dropped_files(ctx);
        self.render(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::FileSource;
    use std::sync::Arc;

    fn dropped_path(path: &str) -> egui::DroppedFile {
        egui::DroppedFile {
            path: Some(PathBuf::from(path)),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            ..Default::default()
        }
    }

    fn dropped_bytes(name: &str, bytes: &[u8]) -> egui::DroppedFile {
        egui::DroppedFile {
            name: name.to_string(),
            bytes: Some(Arc::from(bytes)),
            ..Default::default()
        }
    }

    #[test]
    fn nothing_dropped_yields_nothing() {
        assert!(first_dropped(&[]).is_none());
    }

    #[test]
    fn only_the_first_of_several_drops_is_used() {
        let files = [
            dropped_path("/videos/first.mp4"),
            dropped_path("/videos/second.mp4"),
        ];

        match first_dropped(&files) {
            Some(DroppedInput::Path(path)) => assert_eq!(path, PathBuf::from("/videos/first.mp4")),
            other => panic!("unexpected drop: {:?}", other),
        }
    }

    #[test]
    fn path_wins_over_bytes() {
        let mut file = dropped_path("/videos/clip.mov");
        file.bytes = Some(Arc::from(&b"ignored"[..]));

        assert!(matches!(first_dropped(&[file]), Some(DroppedInput::Path(_))));
    }

    #[test]
    fn drop_without_path_uses_bytes_and_declares_mime() {
        let files = [
            dropped_bytes("clip.mp4", b"0123456789"),
            dropped_path("/videos/other.mp4"),
        ];

        let Some(DroppedInput::Memory(file)) = first_dropped(&files) else {
            panic!("expected an in-memory selection");
        };
        assert_eq!(file.name, "clip.mp4");
        assert_eq!(file.mime, "video/mp4");
        assert_eq!(file.size, 10);
        assert!(matches!(file.source, FileSource::Memory(ref b) if &b[..] == b"0123456789"));
    }

    #[test]
    fn drop_with_neither_path_nor_bytes_is_skipped() {
        let empty = egui::DroppedFile {
            name: "ghost.mp4".to_string(),
            ..Default::default()
        };
        assert!(first_dropped(&[empty, dropped_path("/videos/clip.mp4")]).is_none());
    }
}
