//! Progress arithmetic for one upload attempt.
//!
//! The bar is split 70/30: real upload bytes fill the first 70 percent, a
//! client-side timer fills the remaining 30 while the server's work is
//! assumed to be happening. The timer is an estimate only; nothing from the
//! server drives it.

use crate::utils::file_size::FileSizeUtils;
use std::time::{Duration, Instant};

pub const UPLOAD_SHARE: f32 = 70.0;
pub const PROCESSING_SHARE: f32 = 30.0;
pub const COMPLETE: f32 = 100.0;

pub const PROCESSING_TICK: Duration = Duration::from_millis(500);
const MIN_PROCESSING_SECS: f64 = 5.0;
const PROCESSING_SECS_PER_MB: f64 = 2.0;

/// Upload-phase contribution, in `[0, 70]`.
pub fn upload_progress(sent: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let fraction = (sent as f64 / total as f64).clamp(0.0, 1.0);
    (fraction as f32 * UPLOAD_SHARE).min(UPLOAD_SHARE)
}

/// Estimated processing time: `max(5, size_MB * 2)` seconds.
pub fn estimated_processing_secs(file_size: u64) -> f64 {
    (FileSizeUtils::megabytes(file_size) * PROCESSING_SECS_PER_MB).max(MIN_PROCESSING_SECS)
}

/// Tracks bytes sent since the request started and projects the remaining
/// upload time from the average throughput.
#[derive(Debug, Clone)]
pub struct UploadMeter {
    started: Instant,
    sent: u64,
    total: u64,
}

impl UploadMeter {
    pub fn new(total: u64, started: Instant) -> Self {
        Self {
            started,
            sent: 0,
            total,
        }
    }

    pub fn record(&mut self, sent: u64, total: u64) {
        self.total = total;
        self.sent = self.sent.max(sent.min(total));
    }

    pub fn progress(&self) -> f32 {
        upload_progress(self.sent, self.total)
    }

    #[cfg(test)]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Bytes per second averaged over the whole request so far.
    pub fn throughput(&self, now: Instant) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed <= 0.0 || self.sent == 0 {
            return None;
        }
        Some(self.sent as f64 / elapsed)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let throughput = self.throughput(now)?;
        let left = self.total.saturating_sub(self.sent) as f64;
        Some(Duration::from_secs_f64(left / throughput))
    }
}

/// Fixed-interval timer standing in for server-side processing.
///
/// Owned by the processing phase; dropping it is the cancellation.
#[derive(Debug, Clone)]
pub struct SimulatedProcessing {
    estimated_secs: f64,
    elapsed_secs: f64,
    next_tick: Instant,
}

impl SimulatedProcessing {
    pub fn start(file_size: u64, now: Instant) -> Self {
        Self {
            estimated_secs: estimated_processing_secs(file_size),
            elapsed_secs: 0.0,
            next_tick: now + PROCESSING_TICK,
        }
    }

    /// Fires every tick that has come due by `now`, returning how many fired.
    /// Stops early once the estimate is reached.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let mut fired = 0;
        while !self.is_done() && now >= self.next_tick {
            self.elapsed_secs += PROCESSING_TICK.as_secs_f64();
            self.next_tick += PROCESSING_TICK;
            fired += 1;
        }
        fired
    }

    pub fn next_tick(&self) -> Instant {
        self.next_tick
    }

    pub fn is_done(&self) -> bool {
        self.elapsed_secs >= self.estimated_secs
    }

    pub fn estimated_secs(&self) -> f64 {
        self.estimated_secs
    }

    #[cfg(test)]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// Processing-phase contribution, in `[0, 30]`.
    pub fn contribution(&self) -> f32 {
        let fraction = (self.elapsed_secs / self.estimated_secs) as f32;
        (fraction * PROCESSING_SHARE).clamp(0.0, PROCESSING_SHARE)
    }

    pub fn progress(&self) -> f32 {
        (UPLOAD_SHARE + self.contribution()).min(COMPLETE)
    }

    pub fn remaining(&self) -> Duration {
        Duration::from_secs_f64((self.estimated_secs - self.elapsed_secs).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn upload_share_is_capped_at_seventy() {
        assert_eq!(upload_progress(0, 100), 0.0);
        assert_eq!(upload_progress(50, 100), 35.0);
        assert_eq!(upload_progress(100, 100), 70.0);
        assert_eq!(upload_progress(150, 100), 70.0);
        assert_eq!(upload_progress(10, 0), 0.0);
    }

    #[test]
    fn processing_estimate_has_a_floor_of_five_seconds() {
        assert_eq!(estimated_processing_secs(0), 5.0);
        assert_eq!(estimated_processing_secs(2 * MB), 5.0);
        assert_eq!(estimated_processing_secs(5 * MB), 10.0);
        assert_eq!(estimated_processing_secs(30 * MB), 60.0);
    }

    #[test]
    fn meter_projects_remaining_time_from_throughput() {
        let start = Instant::now();
        let mut meter = UploadMeter::new(1000, start);
        assert!(meter.remaining(start).is_none());

        meter.record(250, 1000);
        let now = start + Duration::from_secs(1);
        assert_eq!(meter.throughput(now), Some(250.0));
        assert_eq!(meter.remaining(now), Some(Duration::from_secs(3)));
        assert_eq!(meter.progress(), 17.5);
    }

    #[test]
    fn meter_never_moves_backwards() {
        let mut meter = UploadMeter::new(100, Instant::now());
        meter.record(80, 100);
        meter.record(40, 100);
        assert_eq!(meter.sent(), 80);
    }

    #[test]
    fn processing_reaches_completion_on_tick_boundary() {
        let start = Instant::now();
        let mut timer = SimulatedProcessing::start(5 * MB, start);
        assert_eq!(timer.estimated_secs(), 10.0);
        assert_eq!(timer.progress(), 70.0);

        assert_eq!(timer.advance(start + Duration::from_millis(499)), 0);
        assert_eq!(timer.advance(start + Duration::from_millis(500)), 1);
        assert_eq!(timer.progress(), 71.5);

        let fired = timer.advance(start + Duration::from_secs(60));
        assert_eq!(fired, 19);
        assert!(timer.is_done());
        assert_eq!(timer.elapsed_secs(), 10.0);
        assert_eq!(timer.progress(), 100.0);
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn processing_progress_is_monotonic_and_bounded() {
        let start = Instant::now();
        let mut timer = SimulatedProcessing::start(3 * MB + 123, start);
        let mut last = timer.progress();
        for step in 1..40 {
            timer.advance(start + PROCESSING_TICK * step);
            let p = timer.progress();
            assert!(p >= last);
            assert!(timer.contribution() <= PROCESSING_SHARE);
            assert!(p <= COMPLETE);
            last = p;
        }
        assert!(timer.is_done());
    }

    #[test]
    fn fractional_estimate_rounds_up_to_next_tick() {
        // 3.3 MB -> 6.6 s estimated, finishes at the 7.0 s tick.
        let start = Instant::now();
        let size = (3.3 * MB as f64) as u64;
        let mut timer = SimulatedProcessing::start(size, start);
        timer.advance(start + Duration::from_millis(6500));
        assert!(!timer.is_done());
        timer.advance(start + Duration::from_millis(7000));
        assert!(timer.is_done());
        assert!(timer.elapsed_secs() - timer.estimated_secs() < 0.5);
    }
}
