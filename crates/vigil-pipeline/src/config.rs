//! Pipeline configuration.

use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frame queue capacity (acquisition -> detection, drop-oldest)
    pub frame_queue_capacity: usize,
    /// Result queue capacity (detection -> presentation, drop-newest)
    pub result_queue_capacity: usize,
    /// Bounded wait used by every queue pop so stages observe shutdown
    pub queue_timeout: Duration,
    /// Acquisition throttle in frames per second
    pub capture_fps: u32,
    /// Samples in the rolling processing-time window
    pub processing_window: usize,
    /// Graceful shutdown timeout for the spawned stages
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_queue_capacity: 8,
            result_queue_capacity: 3,
            queue_timeout: Duration::from_millis(50),
            capture_fps: 30,
            processing_window: 50,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_queue_capacity: std::env::var("VIGIL_FRAME_QUEUE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.frame_queue_capacity),
            result_queue_capacity: std::env::var("VIGIL_RESULT_QUEUE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.result_queue_capacity),
            queue_timeout: Duration::from_millis(
                std::env::var("VIGIL_QUEUE_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(50),
            ),
            capture_fps: std::env::var("VIGIL_CAPTURE_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.capture_fps),
            processing_window: std::env::var("VIGIL_PROCESSING_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.processing_window),
            shutdown_timeout: Duration::from_secs(
                std::env::var("VIGIL_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}
