use crate::config::Timings;
use crate::upload::progress::{
    SimulatedProcessing, UploadMeter, COMPLETE, PROCESSING_TICK, UPLOAD_SHARE,
};
use crate::upload::{FileSource, SelectedFile, UploadError, ValidationError};
use crate::utils::naming::blurred_file_name;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const LABEL_UPLOADING: &str = "Uploading...";
pub const LABEL_PROCESSING: &str = "Processing video...";
pub const LABEL_COMPLETE: &str = "Complete!";
pub const LABEL_FAILED: &str = "Upload failed";

const SUCCESS_MESSAGE: &str = "Processing complete! Your video is ready for download.";

/// Lifecycle of one upload attempt.
#[derive(Debug)]
pub enum Phase {
    Idle,
    Uploading(UploadMeter),
    ServerAck,
    SimulatedProcessing(SimulatedProcessing),
    Success,
    Failed,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Uploading(_) => "uploading",
            Phase::ServerAck => "server-ack",
            Phase::SimulatedProcessing(_) => "processing",
            Phase::Success => "success",
            Phase::Failed => "failed",
        }
    }

    /// An attempt is in flight and owns the status region.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Phase::Uploading(_) | Phase::ServerAck | Phase::SimulatedProcessing(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub percent: f32,
    pub label: String,
    pub remaining: Option<Duration>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            percent: 0.0,
            label: String::new(),
            remaining: None,
        }
    }
}

impl ProgressState {
    fn starting(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    /// Moves forward only; the bar never drops within an attempt.
    fn advance_to(&mut self, percent: f32) {
        self.percent = self.percent.max(percent.min(COMPLETE));
    }
}

/// Which regions are on screen. The drop zone is the complement of the
/// preview, so the two can never show together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visibility {
    preview: bool,
    pub progress_bar: bool,
    pub checkmark: bool,
}

impl Visibility {
    pub fn drop_zone(&self) -> bool {
        !self.preview
    }

    #[cfg(test)]
    pub fn preview(&self) -> bool {
        self.preview
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusKind {
    #[default]
    Neutral,
    Processing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    pub label: String,
    pub href: String,
    pub file_name: String,
}

impl DownloadLink {
    pub fn new(original_name: &str, href: String) -> Self {
        let file_name = blurred_file_name(original_name);
        Self {
            label: format!("Download {}", file_name),
            href,
            file_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub kind: StatusKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub kind: StatusKind,
    pub link: Option<DownloadLink>,
    pub notice: Option<Notice>,
}

impl Status {
    fn new(message: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            message: message.into(),
            kind,
            ..Self::default()
        }
    }

    fn error(err: impl std::fmt::Display) -> Self {
        Self::new(format!("Error: {}", err), StatusKind::Error)
    }
}

/// Local reference to the selected file backing the preview. Dropping it
/// releases the bytes.
#[derive(Debug)]
pub struct PreviewHandle {
    pub name: String,
    pub mime: String,
    pub size: u64,
    source: FileSource,
}

impl PreviewHandle {
    fn new(file: &SelectedFile) -> Self {
        Self {
            name: file.name.clone(),
            mime: file.mime.clone(),
            size: file.size,
            source: file.source.clone(),
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(path) => Some(path),
            FileSource::Memory(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    RevealLink,
    HideProgress,
    HidePreview,
    Rollback,
}

#[derive(Debug, Clone)]
struct AttemptInfo {
    name: String,
    size: u64,
}

/// Handed to the caller when a file is accepted; the caller runs the
/// network request and reports back with the same attempt id.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub attempt: u64,
    pub file: SelectedFile,
}

/// The whole controller: one attempt at a time, every transition driven
/// through the methods below on the UI thread.
#[derive(Debug, Default)]
pub struct UploadState {
    timings: Timings,
    attempt: u64,
    phase: Phase,
    current: Option<AttemptInfo>,
    preview: Option<PreviewHandle>,
    progress: ProgressState,
    visibility: Visibility,
    status: Status,
    pending_link: Option<DownloadLink>,
    deferred: Vec<(Instant, Deferred)>,
}

impl UploadState {
    pub fn new(timings: Timings) -> Self {
        Self {
            timings,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    /// Entry point for every way of picking a file. On acceptance the
    /// preview is shown first, then the upload phase begins.
    pub fn select_file(
        &mut self,
        file: SelectedFile,
        now: Instant,
    ) -> Result<UploadTicket, ValidationError> {
        if self.phase.is_active() {
            warn!(
                file = %file.name,
                phase = self.phase.name(),
                "rejected selection while an upload is active"
            );
            return Err(self.refuse_busy());
        }

        if !file.is_video() {
            let err = ValidationError::NotAVideo {
                mime: file.mime.clone(),
            };
            warn!(file = %file.name, mime = %file.mime, "rejected non-video file");
            self.show_rejection(&err);
            return Err(err);
        }

        self.deferred.clear();
        self.attempt += 1;
        self.hide_video_preview();
        self.show_video_preview(&file);
        self.begin_upload(&file, now);

        Ok(UploadTicket {
            attempt: self.attempt,
            file,
        })
    }

    /// Records a rejection that happened before a `SelectedFile` existed,
    /// e.g. unreadable metadata.
    pub fn reject_selection(&mut self, err: &ValidationError) {
        if self.phase.is_active() {
            warn!(
                phase = self.phase.name(),
                "file selection failed during an active upload: {}", err
            );
            self.refuse_busy();
            return;
        }
        warn!("file selection failed: {}", err);
        self.show_rejection(err);
    }

    /// Leaves the active attempt's status alone and adds a notice line.
    fn refuse_busy(&mut self) -> ValidationError {
        let err = ValidationError::UploadInProgress;
        self.status.notice = Some(Notice {
            message: format!("Error: {}", err),
            kind: StatusKind::Error,
        });
        err
    }

    /// A rejected pick replaces the status, so a link still waiting from the
    /// previous attempt must not be attached to it later.
    fn show_rejection(&mut self, err: &ValidationError) {
        self.pending_link = None;
        self.status = Status::error(err);
    }

    fn begin_upload(&mut self, file: &SelectedFile, now: Instant) {
        info!(attempt = self.attempt, file = %file.name, size = file.size, "upload started");
        self.phase = Phase::Uploading(UploadMeter::new(file.size, now));
        self.current = Some(AttemptInfo {
            name: file.name.clone(),
            size: file.size,
        });
        self.pending_link = None;
        self.progress = ProgressState::starting(LABEL_UPLOADING);
        self.visibility.progress_bar = true;
        self.status = Status::new(
            format!("Uploading and processing \"{}\"...", file.name),
            StatusKind::Processing,
        );
    }

    pub fn on_upload_progress(&mut self, attempt: u64, sent: u64, total: u64, now: Instant) {
        if attempt != self.attempt {
            debug!(attempt, current = self.attempt, "ignoring stale progress");
            return;
        }
        if let Phase::Uploading(meter) = &mut self.phase {
            meter.record(sent, total);
            self.progress.advance_to(meter.progress());
            self.progress.remaining = meter.remaining(now);
        }
    }

    pub fn on_upload_finished(
        &mut self,
        attempt: u64,
        result: Result<String, UploadError>,
        now: Instant,
    ) {
        if attempt != self.attempt {
            debug!(attempt, current = self.attempt, "ignoring stale upload result");
            return;
        }
        if !matches!(self.phase, Phase::Uploading(_)) {
            warn!(phase = self.phase.name(), "upload result outside of upload phase");
            return;
        }

        self.phase = Phase::ServerAck;
        match result {
            Ok(download_url) => self.start_processing(download_url, now),
            Err(err) => self.fail(err, now),
        }
    }

    fn start_processing(&mut self, download_url: String, now: Instant) {
        let (name, size) = match &self.current {
            Some(info) => (info.name.clone(), info.size),
            None => (String::new(), 0),
        };
        let timer = SimulatedProcessing::start(size, now);
        info!(
            attempt = self.attempt,
            estimated_secs = timer.estimated_secs(),
            "server acknowledged upload, simulating processing"
        );

        self.pending_link = Some(DownloadLink::new(&name, download_url));
        self.progress.percent = UPLOAD_SHARE;
        self.progress.label = LABEL_PROCESSING.to_string();
        self.progress.remaining = Some(timer.remaining());
        self.phase = Phase::SimulatedProcessing(timer);
    }

    fn fail(&mut self, err: UploadError, now: Instant) {
        error!(attempt = self.attempt, "upload failed: {}", err);
        self.phase = Phase::Failed;
        self.pending_link = None;
        self.progress = ProgressState::starting(LABEL_FAILED);
        self.status = Status::error(&err);
        self.deferred
            .push((now + self.timings.failure_reset_delay(), Deferred::Rollback));
    }

    fn complete(&mut self, now: Instant) {
        info!(attempt = self.attempt, "processing complete");
        self.phase = Phase::Success;
        self.progress.percent = COMPLETE;
        self.progress.label = LABEL_COMPLETE.to_string();
        self.progress.remaining = None;
        self.show_checkmark();
        self.status = Status::new(SUCCESS_MESSAGE, StatusKind::Success);
        self.deferred
            .push((now + self.timings.link_reveal_delay(), Deferred::RevealLink));
    }

    /// Fires whatever timers have come due and returns the next deadline,
    /// if any, so the caller knows when to poll again.
    pub fn poll(&mut self, now: Instant) -> Option<Instant> {
        let finished = match &mut self.phase {
            Phase::SimulatedProcessing(timer) => {
                if timer.advance(now) > 0 {
                    self.progress.advance_to(timer.progress());
                    self.progress.remaining = Some(timer.remaining());
                }
                timer.is_done().then(|| timer.next_tick() - PROCESSING_TICK)
            }
            _ => None,
        };
        if let Some(done_at) = finished {
            self.complete(done_at);
        }

        loop {
            self.deferred.sort_by_key(|(at, _)| *at);
            match self.deferred.first() {
                Some((at, _)) if *at <= now => {
                    let (at, action) = self.deferred.remove(0);
                    self.apply(action, at);
                }
                _ => break,
            }
        }

        self.next_deadline()
    }

    fn apply(&mut self, action: Deferred, at: Instant) {
        debug!(attempt = self.attempt, ?action, "deferred action");
        match action {
            Deferred::RevealLink => {
                let link = self.pending_link.take();
                if self.status.kind == StatusKind::Success {
                    self.status.link = link;
                }
                self.deferred
                    .push((at + self.timings.progress_hide_delay(), Deferred::HideProgress));
                self.deferred
                    .push((at + self.timings.preview_hide_delay(), Deferred::HidePreview));
            }
            Deferred::HideProgress => self.visibility.progress_bar = false,
            Deferred::HidePreview => {
                self.hide_video_preview();
                self.finish_attempt();
            }
            Deferred::Rollback => {
                self.visibility.progress_bar = false;
                self.hide_video_preview();
                self.finish_attempt();
            }
        }
    }

    fn finish_attempt(&mut self) {
        self.phase = Phase::Idle;
        self.current = None;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let tick = match &self.phase {
            Phase::SimulatedProcessing(timer) => Some(timer.next_tick()),
            _ => None,
        };
        self.deferred
            .iter()
            .map(|(at, _)| *at)
            .chain(tick)
            .min()
    }

    fn show_video_preview(&mut self, file: &SelectedFile) {
        self.preview = Some(PreviewHandle::new(file));
        self.visibility.preview = true;
        self.visibility.checkmark = false;
    }

    pub fn show_checkmark(&mut self) {
        if self.visibility.preview {
            self.visibility.checkmark = true;
        }
    }

    pub fn hide_video_preview(&mut self) {
        self.visibility.preview = false;
        self.visibility.checkmark = false;
        if let Some(handle) = self.preview.take() {
            debug!(file = %handle.name, "released preview");
        }
    }

    /// Clears everything back to the initial screen. Ignored while an
    /// attempt is in flight, since there is no cancellation.
    pub fn reset(&mut self) {
        if self.phase.is_active() {
            warn!("reset requested during an active upload; ignoring");
            return;
        }
        info!("resetting upload state");
        self.deferred.clear();
        self.hide_video_preview();
        self.attempt += 1;
        self.phase = Phase::Idle;
        self.current = None;
        self.pending_link = None;
        self.progress = ProgressState::default();
        self.visibility = Visibility::default();
        self.status = Status::default();
    }

    pub fn download_started(&mut self, dest: &Path) {
        self.status.notice = Some(Notice {
            message: format!("Saving to {}...", dest.display()),
            kind: StatusKind::Processing,
        });
    }

    pub fn on_download_finished(&mut self, attempt: u64, result: Result<PathBuf, String>) {
        if attempt != self.attempt {
            debug!(attempt, current = self.attempt, "ignoring stale download result");
            return;
        }
        self.status.notice = Some(match result {
            Ok(path) => Notice {
                message: format!("Saved to {}", path.display()),
                kind: StatusKind::Success,
            },
            Err(reason) => Notice {
                message: format!("Download failed: {}", reason),
                kind: StatusKind::Error,
            },
        });
    }
}
