//! Alert debouncing and bounded alert history.
//!
//! The notifier sits in front of the external alert sink: only HIGH and
//! CRITICAL levels pass, level transitions pass immediately, and repeats
//! are rate-limited by a per-level cooldown so audio playback does not
//! fire every frame.
//!
//! The history keeps a bounded ring of alert records with session
//! statistics, recent-N queries, and JSON/CSV export.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use vigil_models::detection::DetectionResult;
use vigil_models::states::AlertLevel;

use crate::error::PipelineResult;
use crate::providers::{AlertEvent, AlertSink, HistorySink};

/// Default seconds between repeated alerts of the same level.
pub const DEFAULT_COOLDOWN_SECS: f64 = 3.0;
/// Default alert-history ring capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;
/// Alerts closer together than this count as one consecutive streak.
const CONSECUTIVE_GAP_SECS: f64 = 5.0;

/// Cooldown gate in front of an [`AlertSink`].
pub struct AlertNotifier {
    sink: Box<dyn AlertSink>,
    cooldown_secs: f64,
    previous_level: AlertLevel,
    last_high: Option<f64>,
    last_critical: Option<f64>,
}

impl AlertNotifier {
    pub fn new(sink: Box<dyn AlertSink>, cooldown_secs: f64) -> Self {
        Self {
            sink,
            cooldown_secs,
            previous_level: AlertLevel::None,
            last_high: None,
            last_critical: None,
        }
    }

    pub fn with_default_cooldown(sink: Box<dyn AlertSink>) -> Self {
        Self::new(sink, DEFAULT_COOLDOWN_SECS)
    }

    /// Feed one detection result; forwards an event when it should be
    /// heard.
    pub fn observe(&mut self, result: &DetectionResult) {
        let level = result.alert_level;
        let previous = std::mem::replace(&mut self.previous_level, level);

        if !level.is_alerting() {
            return;
        }

        let last = if level == AlertLevel::Critical {
            &mut self.last_critical
        } else {
            &mut self.last_high
        };
        let transitioned = level != previous;
        let cooled = last.map_or(true, |t| result.timestamp - t >= self.cooldown_secs);
        if !transitioned && !cooled {
            debug!(level = %level, "alert suppressed by cooldown");
            return;
        }
        *last = Some(result.timestamp);

        let event = AlertEvent {
            timestamp: result.timestamp,
            previous,
            level,
            confidence: result.confidence,
            contributing_factors: result.contributing_factors.clone(),
            recommendation: result.recommendation.clone(),
        };
        self.sink.on_alert(&event);
    }

    /// Clear the cooldown state (on session reset).
    pub fn reset(&mut self) {
        self.previous_level = AlertLevel::None;
        self.last_high = None;
        self.last_critical = None;
    }
}

/// One stored alert.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub timestamp: f64,
    pub wall_clock: DateTime<Utc>,
    pub level: AlertLevel,
    pub confidence: f64,
    pub ear: Option<f64>,
    pub mar: Option<f64>,
    pub pitch: Option<f64>,
}

/// Session-level alert statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AlertStats {
    pub total: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
    /// Longest run of alerts spaced under five seconds apart.
    pub max_consecutive: u32,
    pub average_confidence: f64,
}

/// Bounded ring of alert records with statistics and export.
pub struct AlertHistory {
    records: VecDeque<AlertRecord>,
    capacity: usize,
    session_start: DateTime<Utc>,
    stats: AlertStats,
    consecutive: u32,
    last_alert_at: Option<f64>,
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            session_start: Utc::now(),
            stats: AlertStats::default(),
            consecutive: 0,
            last_alert_at: None,
        }
    }

    /// Record a result; frames at `NONE` are not stored.
    pub fn record(&mut self, result: &DetectionResult) {
        if result.alert_level == AlertLevel::None {
            return;
        }

        let record = AlertRecord {
            timestamp: result.timestamp,
            wall_clock: result.wall_clock,
            level: result.alert_level,
            confidence: result.confidence,
            ear: result.ear,
            mar: result.mar,
            pitch: result.head_pose.map(|p| p.pitch),
        };

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);

        self.stats.total += 1;
        match result.alert_level {
            AlertLevel::Low => self.stats.low += 1,
            AlertLevel::Medium => self.stats.medium += 1,
            AlertLevel::High => self.stats.high += 1,
            AlertLevel::Critical => self.stats.critical += 1,
            AlertLevel::None => {}
        }

        let streak_continues = self
            .last_alert_at
            .is_some_and(|t| result.timestamp - t < CONSECUTIVE_GAP_SECS);
        self.consecutive = if streak_continues {
            self.consecutive + 1
        } else {
            1
        };
        self.stats.max_consecutive = self.stats.max_consecutive.max(self.consecutive);
        self.last_alert_at = Some(result.timestamp);

        let sum: f64 = self.records.iter().map(|r| r.confidence).sum();
        self.stats.average_confidence = sum / self.records.len() as f64;
    }

    /// The `count` most recent records, newest last.
    pub fn recent(&self, count: usize) -> Vec<AlertRecord> {
        let skip = self.records.len().saturating_sub(count);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> AlertStats {
        self.stats
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    /// Export the full history as pretty-printed JSON.
    pub fn export_json(&self, path: &Path) -> PipelineResult<()> {
        let payload = serde_json::json!({
            "session_start": self.session_start,
            "stats": self.stats,
            "alerts": self.records,
        });
        std::fs::write(path, serde_json::to_string_pretty(&payload)?)?;
        Ok(())
    }

    /// Export the full history as CSV.
    pub fn export_csv(&self, path: &Path) -> PipelineResult<()> {
        let mut out = String::from("timestamp,wall_clock,level,confidence,ear,mar,pitch\n");
        let fmt = |v: Option<f64>| v.map(|x| format!("{:.4}", x)).unwrap_or_default();
        for r in &self.records {
            out.push_str(&format!(
                "{:.3},{},{},{:.3},{},{},{}\n",
                r.timestamp,
                r.wall_clock.to_rfc3339(),
                r.level,
                r.confidence,
                fmt(r.ear),
                fmt(r.mar),
                fmt(r.pitch),
            ));
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Drop every record and restart the statistics.
    pub fn clear(&mut self) {
        self.records.clear();
        self.stats = AlertStats::default();
        self.consecutive = 0;
        self.last_alert_at = None;
        self.session_start = Utc::now();
    }
}

impl HistorySink for AlertHistory {
    fn on_result(&mut self, result: &DetectionResult) {
        self.record(result);
    }
}

/// Clonable handle to an [`AlertHistory`] shared with the pipeline.
#[derive(Clone)]
pub struct SharedAlertHistory(Arc<Mutex<AlertHistory>>);

impl SharedAlertHistory {
    pub fn new(capacity: usize) -> Self {
        Self(Arc::new(Mutex::new(AlertHistory::new(capacity))))
    }

    pub fn recent(&self, count: usize) -> Vec<AlertRecord> {
        self.lock().recent(count)
    }

    pub fn stats(&self) -> AlertStats {
        self.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn export_json(&self, path: &Path) -> PipelineResult<()> {
        self.lock().export_json(path)
    }

    pub fn export_csv(&self, path: &Path) -> PipelineResult<()> {
        self.lock().export_csv(path)
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AlertHistory> {
        self.0.lock().expect("alert history lock")
    }
}

impl HistorySink for SharedAlertHistory {
    fn on_result(&mut self, result: &DetectionResult) {
        self.lock().record(result);
    }
}
