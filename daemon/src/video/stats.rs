//! Per-player playback statistics

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Tracks video playback statistics
pub struct VideoStats {
    /// Number of frames put on screen
    frames_rendered: u64,

    /// Frames replaced in the slot before they were presented
    frames_dropped: Arc<AtomicU64>,

    /// Number of completed loops
    loops: u64,

    fps: Option<f64>,

    last_stats_log: Instant,
}

impl VideoStats {
    pub fn new(fps: Option<f64>) -> Self {
        Self {
            frames_rendered: 0,
            frames_dropped: Arc::new(AtomicU64::new(0)),
            loops: 0,
            fps,
            last_stats_log: Instant::now(),
        }
    }

    /// Get clone of frames_dropped counter for GStreamer callback
    pub fn frames_dropped_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames_dropped)
    }

    pub fn increment_rendered(&mut self) {
        self.frames_rendered += 1;
    }

    pub fn increment_loops(&mut self) {
        self.loops += 1;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Get current drop rate as percentage
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.frames_dropped();
        let total = self.frames_rendered + dropped;
        if total == 0 {
            0.0
        } else {
            (dropped as f64 / total as f64) * 100.0
        }
    }

    /// Log statistics if interval has elapsed
    pub fn maybe_log_stats(&mut self, label: &str, interval: Duration) {
        if self.last_stats_log.elapsed() < interval {
            return;
        }

        log::debug!(
            "{} ({:.2} fps): {} rendered, {} dropped ({:.1}% drop rate), {} loop(s)",
            label,
            self.fps.unwrap_or(0.0),
            self.frames_rendered,
            self.frames_dropped(),
            self.drop_rate(),
            self.loops
        );

        self.last_stats_log = Instant::now();
    }
}
