//! Fatigue monitor binary.
//!
//! Drives the full pipeline end-to-end against the synthetic camera and a
//! scripted landmark provider that alternates calm and drowsy episodes.
//! Real deployments embed [`vigil_pipeline::Pipeline`] as a library and
//! plug in their own camera and landmark model.

use std::path::Path;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vigil_models::config::FatigueConfig;
use vigil_pipeline::alerts::DEFAULT_HISTORY_CAPACITY;
use vigil_pipeline::{
    calm_face, drowsy_face, AlertNotifier, ConsolePresenter, Pipeline, PipelineConfig,
    ScriptedLandmarkProvider, SharedAlertHistory, SyntheticFrameSource, TracingAlertSink,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vigil=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vigil-monitor");

    // Install the Prometheus recorder so the metrics facade has a backend
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        error!("Failed to install metrics recorder: {}", e);
    }

    // Load configuration
    let preset = std::env::var("VIGIL_PRESET").unwrap_or_else(|_| "default".to_string());
    let fatigue = match FatigueConfig::preset(&preset) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid preset '{}': {}", preset, e);
            std::process::exit(1);
        }
    };
    let config = PipelineConfig::from_env();
    info!(preset = %preset, "Pipeline config: {:?}", config);

    let pipeline = match Pipeline::new(config.clone(), fatigue) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to build pipeline: {}", e);
            std::process::exit(1);
        }
    };
    let handle = pipeline.handle();

    // Setup signal handler
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            handle.stop();
        });
    }

    // Optional bounded run for selfchecks
    if let Some(secs) = std::env::var("VIGIL_DEMO_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("Demo window elapsed, stopping");
            handle.stop();
        });
    }

    let source = SyntheticFrameSource::new(640, 480, config.capture_fps as f64);
    // Ten calm seconds, then an eight-second drowsy episode, repeating
    let provider = ScriptedLandmarkProvider::new(|t| {
        if t % 18.0 < 10.0 {
            calm_face()
        } else {
            drowsy_face()
        }
    });

    let history = SharedAlertHistory::new(DEFAULT_HISTORY_CAPACITY);
    let alerts = AlertNotifier::with_default_cooldown(Box::new(TracingAlertSink));

    if let Err(e) = pipeline
        .run(
            source,
            provider,
            ConsolePresenter::default(),
            alerts,
            Box::new(history.clone()),
        )
        .await
    {
        error!("Pipeline error: {}", e);
        std::process::exit(1);
    }

    let stats = history.stats();
    info!(
        total = stats.total,
        high = stats.high,
        critical = stats.critical,
        "Session alert totals"
    );

    if let Ok(path) = std::env::var("VIGIL_EXPORT_PATH") {
        match history.export_json(Path::new(&path)) {
            Ok(()) => info!("Alert history exported to {}", path),
            Err(e) => error!("Alert history export failed: {}", e),
        }
    }

    info!("vigil-monitor shutdown complete");
}
