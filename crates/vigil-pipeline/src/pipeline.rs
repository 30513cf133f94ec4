//! Three-stage pipeline orchestrator.
//!
//! Acquisition and detection run as spawned tasks; presentation runs on
//! the caller's task so `run` doubles as the driving loop. The stages are
//! connected by bounded queues (drop-oldest frames, drop-newest results)
//! and every blocking wait is capped at the configured queue timeout, so a
//! single stop signal is observed by all three stages within one interval.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use vigil_engine::Session;
use vigil_models::config::FatigueConfig;
use vigil_models::landmarks::LandmarkFrame;
use vigil_signals::RollingWindow;

use crate::alerts::AlertNotifier;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{FpsWindow, MetricsSnapshot, PipelineMetrics};
use crate::providers::{
    CapturedFrame, DetectionUpdate, FrameSource, HistorySink, LandmarkProvider, PipelineCommand,
    PresentationUpdate, Presenter,
};
use crate::queue::{BoundedQueue, DropPolicy};

/// Control handle shared with callers while the pipeline runs.
#[derive(Clone)]
pub struct PipelineHandle {
    shutdown: Arc<watch::Sender<bool>>,
    commands: mpsc::Sender<PipelineCommand>,
    metrics: Arc<PipelineMetrics>,
    session: Arc<Mutex<Session>>,
}

impl PipelineHandle {
    /// Signal every stage to stop.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Inject a user command; dropped if the command queue is full.
    pub fn try_command(&self, command: PipelineCommand) -> bool {
        self.commands.try_send(command).is_ok()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared session for export/query collaborators.
    pub fn session(&self) -> Arc<Mutex<Session>> {
        Arc::clone(&self.session)
    }
}

/// The assembled pipeline, ready to run.
pub struct Pipeline {
    config: PipelineConfig,
    session: Arc<Mutex<Session>>,
    metrics: Arc<PipelineMetrics>,
    shutdown: Arc<watch::Sender<bool>>,
    command_tx: mpsc::Sender<PipelineCommand>,
    command_rx: mpsc::Receiver<PipelineCommand>,
}

impl Pipeline {
    /// Build a pipeline with a fresh session. The fatigue configuration is
    /// validated here, before any stage starts.
    pub fn new(config: PipelineConfig, fatigue: FatigueConfig) -> PipelineResult<Self> {
        let session = Session::new(fatigue)?;
        let (shutdown, _) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(16);

        Ok(Self {
            config,
            session: Arc::new(Mutex::new(session)),
            metrics: Arc::new(PipelineMetrics::new()),
            shutdown: Arc::new(shutdown),
            command_tx,
            command_rx,
        })
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            shutdown: Arc::clone(&self.shutdown),
            commands: self.command_tx.clone(),
            metrics: Arc::clone(&self.metrics),
            session: Arc::clone(&self.session),
        }
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until a stop signal or a `Quit` command.
    ///
    /// Acquisition and detection are spawned; presentation runs on the
    /// caller's task. Returns once all stages have stopped.
    pub async fn run(
        self,
        source: impl FrameSource + 'static,
        provider: impl LandmarkProvider + 'static,
        presenter: impl Presenter,
        alerts: AlertNotifier,
        history: Box<dyn HistorySink>,
    ) -> PipelineResult<()> {
        info!(
            frame_queue = self.config.frame_queue_capacity,
            result_queue = self.config.result_queue_capacity,
            capture_fps = self.config.capture_fps,
            "starting pipeline"
        );

        let frame_queue = Arc::new(BoundedQueue::new(
            self.config.frame_queue_capacity,
            DropPolicy::Oldest,
        ));
        let result_queue = Arc::new(BoundedQueue::new(
            self.config.result_queue_capacity,
            DropPolicy::Newest,
        ));

        let acquisition = tokio::spawn(acquisition_stage(
            source,
            Arc::clone(&frame_queue),
            Arc::clone(&self.metrics),
            self.shutdown.subscribe(),
            self.config.clone(),
        ));
        let detection = tokio::spawn(detection_stage(
            provider,
            frame_queue,
            Arc::clone(&result_queue),
            Arc::clone(&self.session),
            Arc::clone(&self.metrics),
            alerts,
            history,
            self.shutdown.subscribe(),
            self.config.clone(),
        ));

        presentation_stage(
            presenter,
            result_queue,
            Arc::clone(&self.session),
            Arc::clone(&self.metrics),
            self.command_rx,
            Arc::clone(&self.shutdown),
            self.config.clone(),
        )
        .await;

        // Presentation has stopped; the other stages observe the same
        // signal within one queue timeout
        self.shutdown.send_replace(true);

        match tokio::time::timeout(self.config.shutdown_timeout, async {
            tokio::join!(acquisition, detection)
        })
        .await
        {
            Err(_) => Err(PipelineError::ShutdownTimeout(self.config.shutdown_timeout)),
            Ok((acquisition, detection)) => {
                stage_result("acquisition", acquisition)?;
                stage_result("detection", detection)?;
                info!("pipeline stopped");
                Ok(())
            }
        }
    }
}

fn stage_result(stage: &'static str, joined: Result<(), JoinError>) -> PipelineResult<()> {
    joined.map_err(|e| PipelineError::stage_failed(stage, e.to_string()))
}

/// A panic caught at the detection boundary may have poisoned the session
/// lock; the state inside is still consistent enough for diagnostics, so
/// recover the guard rather than propagate.
fn lock_session(session: &Arc<Mutex<Session>>) -> MutexGuard<'_, Session> {
    match session.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn acquisition_stage(
    mut source: impl FrameSource,
    frames: Arc<BoundedQueue<CapturedFrame>>,
    metrics: Arc<PipelineMetrics>,
    mut shutdown: watch::Receiver<bool>,
    config: PipelineConfig,
) {
    let period = Duration::from_secs_f64(1.0 / config.capture_fps.max(1) as f64);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut fps = FpsWindow::new();

    info!(stage = "acquisition", source = source.name(), "stage started");
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                if let Some(frame) = source.poll() {
                    metrics.record_capture();
                    if frames.push(frame).is_some() {
                        metrics.record_dropped_frame();
                        debug!(stage = "acquisition", "frame queue full, dropped oldest");
                    }
                    if let Some(rate) = fps.tick() {
                        metrics.set_capture_fps(rate);
                    }
                }
            }
        }
    }
    info!(stage = "acquisition", "stage stopped");
}

#[allow(clippy::too_many_arguments)]
async fn detection_stage(
    mut provider: impl LandmarkProvider,
    frames: Arc<BoundedQueue<CapturedFrame>>,
    results: Arc<BoundedQueue<DetectionUpdate>>,
    session: Arc<Mutex<Session>>,
    metrics: Arc<PipelineMetrics>,
    mut alerts: AlertNotifier,
    mut history: Box<dyn HistorySink>,
    shutdown: watch::Receiver<bool>,
    config: PipelineConfig,
) {
    let mut durations = RollingWindow::new(config.processing_window);
    let mut fps = FpsWindow::new();

    info!(stage = "detection", provider = provider.name(), "stage started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let Some(frame) = frames.pop_timeout(config.queue_timeout).await else {
            continue;
        };

        let started = Instant::now();

        // Per-frame fault boundary: one bad frame must never take the
        // stage down
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let points = provider.detect(&frame);
            let landmark_frame =
                LandmarkFrame::from_labeled(frame.timestamp, frame.width, frame.height, &points);
            if !landmark_frame.has_face() {
                return None;
            }
            Some(lock_session(&session).process_frame(&landmark_frame))
        }));

        let update = match outcome {
            Err(payload) => {
                error!(
                    stage = "detection",
                    frame = frame.sequence,
                    "frame processing panicked: {}",
                    panic_message(payload.as_ref())
                );
                continue;
            }
            Ok(None) => DetectionUpdate::NoFace {
                timestamp: frame.timestamp,
            },
            Ok(Some(result)) => {
                metrics.record_face();
                if result.is_alerting() {
                    metrics.record_alert();
                }
                alerts.observe(&result);
                history.on_result(&result);
                DetectionUpdate::Result(result)
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics.record_processed(elapsed);
        durations.push(elapsed);
        if let Some(mean) = durations.recent_mean(config.processing_window) {
            metrics.set_avg_processing_time(mean);
        }

        if results.push(update).is_some() {
            metrics.record_dropped_result();
        }
        if let Some(rate) = fps.tick() {
            metrics.set_processing_fps(rate);
        }
    }
    info!(stage = "detection", "stage stopped");
}

async fn presentation_stage(
    mut presenter: impl Presenter,
    results: Arc<BoundedQueue<DetectionUpdate>>,
    session: Arc<Mutex<Session>>,
    metrics: Arc<PipelineMetrics>,
    mut commands: mpsc::Receiver<PipelineCommand>,
    shutdown: Arc<watch::Sender<bool>>,
    config: PipelineConfig,
) {
    let mut shutdown_rx = shutdown.subscribe();
    let mut fps = FpsWindow::new();
    let mut last_update: Option<PresentationUpdate> = None;

    info!(stage = "presentation", presenter = presenter.name(), "stage started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        while let Ok(command) = commands.try_recv() {
            match command {
                PipelineCommand::Quit => {
                    info!(stage = "presentation", "quit command received");
                    shutdown.send_replace(true);
                }
                PipelineCommand::Reset => {
                    lock_session(&session).reset();
                }
                PipelineCommand::Snapshot => {
                    presenter.snapshot(last_update.as_ref());
                }
            }
        }

        if let Some(detection) = results.pop_timeout(config.queue_timeout).await {
            let update = PresentationUpdate {
                detection,
                metrics: metrics.snapshot(),
            };
            presenter.render(&update);
            if let Some(rate) = fps.tick() {
                metrics.set_display_fps(rate);
            }
            last_update = Some(update);
        }
    }
    info!(stage = "presentation", "stage stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
