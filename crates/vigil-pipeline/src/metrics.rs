//! Pipeline metrics.
//!
//! [`PipelineMetrics`] is the shared diagnostic snapshot the presentation
//! layer renders: plain atomics, one writer per field by convention, never
//! used for control flow. The same events are also recorded through the
//! `metrics` facade so a Prometheus exporter can scrape them when the
//! binary installs a recorder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use serde::Serialize;

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_CAPTURED_TOTAL: &str = "vigil_frames_captured_total";
    pub const FRAMES_DROPPED_TOTAL: &str = "vigil_frames_dropped_total";
    pub const RESULTS_DROPPED_TOTAL: &str = "vigil_results_dropped_total";
    pub const FRAMES_PROCESSED_TOTAL: &str = "vigil_frames_processed_total";
    pub const FACES_DETECTED_TOTAL: &str = "vigil_faces_detected_total";
    pub const ALERTS_TRIGGERED_TOTAL: &str = "vigil_alerts_triggered_total";
    pub const PROCESSING_DURATION_SECONDS: &str = "vigil_processing_duration_seconds";
    pub const CAPTURE_FPS: &str = "vigil_capture_fps";
    pub const PROCESSING_FPS: &str = "vigil_processing_fps";
    pub const DISPLAY_FPS: &str = "vigil_display_fps";
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub capture_fps: f64,
    pub processing_fps: f64,
    pub display_fps: f64,
    pub avg_processing_time: f64,
    pub total_frames: u64,
    pub dropped_frames: u64,
    pub dropped_results: u64,
    pub processed_frames: u64,
    pub faces_detected: u64,
    pub alerts_triggered: u64,
}

/// Shared, approximate pipeline counters.
///
/// Each stage updates its own fields; readers take a [`MetricsSnapshot`].
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    capture_fps: AtomicU64,
    processing_fps: AtomicU64,
    display_fps: AtomicU64,
    avg_processing_time: AtomicU64,
    total_frames: AtomicU64,
    dropped_frames: AtomicU64,
    dropped_results: AtomicU64,
    processed_frames: AtomicU64,
    faces_detected: AtomicU64,
    alerts_triggered: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_capture(&self) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
        counter!(names::FRAMES_CAPTURED_TOTAL).increment(1);
    }

    pub fn record_dropped_frame(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        counter!(names::FRAMES_DROPPED_TOTAL).increment(1);
    }

    pub fn record_dropped_result(&self) {
        self.dropped_results.fetch_add(1, Ordering::Relaxed);
        counter!(names::RESULTS_DROPPED_TOTAL).increment(1);
    }

    pub fn record_processed(&self, duration_secs: f64) {
        self.processed_frames.fetch_add(1, Ordering::Relaxed);
        counter!(names::FRAMES_PROCESSED_TOTAL).increment(1);
        histogram!(names::PROCESSING_DURATION_SECONDS).record(duration_secs);
    }

    pub fn record_face(&self) {
        self.faces_detected.fetch_add(1, Ordering::Relaxed);
        counter!(names::FACES_DETECTED_TOTAL).increment(1);
    }

    pub fn record_alert(&self) {
        self.alerts_triggered.fetch_add(1, Ordering::Relaxed);
        counter!(names::ALERTS_TRIGGERED_TOTAL).increment(1);
    }

    pub fn set_capture_fps(&self, fps: f64) {
        self.capture_fps.store(fps.to_bits(), Ordering::Relaxed);
        gauge!(names::CAPTURE_FPS).set(fps);
    }

    pub fn set_processing_fps(&self, fps: f64) {
        self.processing_fps.store(fps.to_bits(), Ordering::Relaxed);
        gauge!(names::PROCESSING_FPS).set(fps);
    }

    pub fn set_display_fps(&self, fps: f64) {
        self.display_fps.store(fps.to_bits(), Ordering::Relaxed);
        gauge!(names::DISPLAY_FPS).set(fps);
    }

    pub fn set_avg_processing_time(&self, secs: f64) {
        self.avg_processing_time
            .store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            capture_fps: f64::from_bits(self.capture_fps.load(Ordering::Relaxed)),
            processing_fps: f64::from_bits(self.processing_fps.load(Ordering::Relaxed)),
            display_fps: f64::from_bits(self.display_fps.load(Ordering::Relaxed)),
            avg_processing_time: f64::from_bits(self.avg_processing_time.load(Ordering::Relaxed)),
            total_frames: self.total_frames.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            dropped_results: self.dropped_results.load(Ordering::Relaxed),
            processed_frames: self.processed_frames.load(Ordering::Relaxed),
            faces_detected: self.faces_detected.load(Ordering::Relaxed),
            alerts_triggered: self.alerts_triggered.load(Ordering::Relaxed),
        }
    }
}

/// One-second sliding window for per-stage FPS.
#[derive(Debug)]
pub(crate) struct FpsWindow {
    window_start: Instant,
    count: u32,
}

impl FpsWindow {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Count one completed operation; yields the rate once per second.
    pub fn tick(&mut self) -> Option<f64> {
        self.count += 1;
        let elapsed = self.window_start.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            let fps = self.count as f64 / elapsed;
            self.window_start = Instant::now();
            self.count = 0;
            Some(fps)
        } else {
            None
        }
    }
}
