//! Concurrent fatigue-detection pipeline.
//!
//! This crate provides:
//! - The three-stage orchestrator (acquisition, detection+fusion,
//!   presentation) with bounded queues and cooperative shutdown
//! - Lock-free pipeline metrics with one-second FPS windows
//! - Alert debouncing and a bounded alert history with export
//! - Traits for the external collaborators (camera, landmark model,
//!   presenter, sinks) plus synthetic implementations for tests and the
//!   selfcheck binary

pub mod alerts;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod providers;
pub mod queue;

pub use alerts::{AlertHistory, AlertNotifier, AlertRecord, SharedAlertHistory};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{Pipeline, PipelineHandle};
pub use providers::{
    calm_face, drowsy_face, synthetic_face, AlertEvent, AlertSink, CapturedFrame, ConsolePresenter,
    DetectionUpdate, FrameSource, HistorySink, LandmarkProvider, PipelineCommand,
    PresentationUpdate, Presenter, ScriptedLandmarkProvider, SyntheticFrameSource,
    TracingAlertSink,
};
pub use queue::{BoundedQueue, DropPolicy};
