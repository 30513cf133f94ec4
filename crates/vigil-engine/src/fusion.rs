//! Rule-based fusion of the three signal states.
//!
//! Each signal's most severe value counts as high-risk, intermediate
//! values as medium-risk. The rule, evaluated in order:
//!
//! 1. `HIGH` when at least `combination_threshold` signals are high-risk
//! 2. `MEDIUM` when any signal is high-risk, or two are medium-risk
//! 3. `LOW` when one signal is medium-risk
//! 4. `NONE` otherwise
//!
//! A `HIGH` level sustained for `critical_duration` seconds is promoted to
//! `CRITICAL`. Any frame that computes below `HIGH` clears the escalation
//! timer immediately; there is no hysteresis on the way down.

use vigil_models::config::FusionConfig;
use vigil_models::states::{AlertLevel, EyeState, FatigueState, HeadState, MouthState};

/// Per-frame output of the fusion rule.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionDecision {
    pub alert_level: AlertLevel,
    pub fatigue_state: FatigueState,
    /// Confidence in [0, 1]: the level's base value plus 0.1 per active
    /// high-risk signal.
    pub confidence: f64,
    /// Names of the high-risk states currently active.
    pub contributing_factors: Vec<&'static str>,
    pub recommendation: &'static str,
}

/// Combines categorical signal states into a graded alert.
#[derive(Debug)]
pub struct FusionEngine {
    config: FusionConfig,
    high_alert_start: Option<f64>,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            high_alert_start: None,
        }
    }

    /// Evaluate one frame's states at the given timestamp (seconds).
    pub fn evaluate(
        &mut self,
        eye: EyeState,
        mouth: MouthState,
        head: HeadState,
        timestamp: f64,
    ) -> FusionDecision {
        let (high_risk, medium_risk) = risk_counts(eye, mouth, head);

        let mut alert_level = if high_risk >= self.config.combination_threshold {
            AlertLevel::High
        } else if high_risk >= 1 || medium_risk >= 2 {
            AlertLevel::Medium
        } else if medium_risk >= 1 {
            AlertLevel::Low
        } else {
            AlertLevel::None
        };

        if alert_level == AlertLevel::High {
            let start = *self.high_alert_start.get_or_insert(timestamp);
            if timestamp - start >= self.config.critical_duration {
                alert_level = AlertLevel::Critical;
            }
        } else {
            self.high_alert_start = None;
        }

        let contributing_factors: Vec<&'static str> = [
            eye.contributing_factor(),
            mouth.contributing_factor(),
            head.contributing_factor(),
        ]
        .into_iter()
        .flatten()
        .collect();

        let confidence =
            (alert_level.base_confidence() + 0.1 * high_risk as f64).min(1.0);

        FusionDecision {
            alert_level,
            fatigue_state: FatigueState::from(alert_level),
            confidence,
            contributing_factors,
            recommendation: alert_level.recommendation(),
        }
    }

    /// Seconds the current HIGH streak has lasted, if one is active.
    pub fn high_alert_elapsed(&self, timestamp: f64) -> Option<f64> {
        self.high_alert_start.map(|start| timestamp - start)
    }

    /// Clear the escalation timer.
    pub fn reset(&mut self) {
        self.high_alert_start = None;
    }
}

/// Count high- and medium-risk signals with exhaustive matching.
fn risk_counts(eye: EyeState, mouth: MouthState, head: HeadState) -> (u32, u32) {
    let mut high = 0;
    let mut medium = 0;

    match eye {
        EyeState::Drowsy => high += 1,
        EyeState::Closing => medium += 1,
        EyeState::Open | EyeState::Blinking => {}
    }
    match mouth {
        MouthState::Yawning => high += 1,
        MouthState::WideOpen => medium += 1,
        MouthState::Closed | MouthState::Speaking | MouthState::SlightlyOpen => {}
    }
    match head {
        HeadState::HeadDownDrowsy => high += 1,
        HeadState::Tilted | HeadState::HeadDown => medium += 1,
        HeadState::Normal | HeadState::SlightlyTilted => {}
    }

    (high, medium)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionConfig::default())
    }

    #[test]
    fn test_two_high_risk_signals_reach_high() {
        let mut fusion = engine();
        let decision = fusion.evaluate(
            EyeState::Drowsy,
            MouthState::Yawning,
            HeadState::Normal,
            0.0,
        );
        assert_eq!(decision.alert_level, AlertLevel::High);
        assert_eq!(decision.fatigue_state, FatigueState::SeverelyTired);
    }

    #[test]
    fn test_single_high_risk_is_at_most_medium() {
        let mut fusion = engine();
        let decision = fusion.evaluate(
            EyeState::Drowsy,
            MouthState::Closed,
            HeadState::Normal,
            0.0,
        );
        assert_eq!(decision.alert_level, AlertLevel::Medium);
    }

    #[test]
    fn test_two_medium_risk_signals_reach_medium() {
        let mut fusion = engine();
        let decision = fusion.evaluate(
            EyeState::Closing,
            MouthState::WideOpen,
            HeadState::Normal,
            0.0,
        );
        assert_eq!(decision.alert_level, AlertLevel::Medium);
    }

    #[test]
    fn test_one_medium_risk_signal_is_low() {
        let mut fusion = engine();
        let decision = fusion.evaluate(
            EyeState::Open,
            MouthState::Closed,
            HeadState::Tilted,
            0.0,
        );
        assert_eq!(decision.alert_level, AlertLevel::Low);
    }

    #[test]
    fn test_all_calm_is_none() {
        let mut fusion = engine();
        let decision = fusion.evaluate(
            EyeState::Open,
            MouthState::Speaking,
            HeadState::SlightlyTilted,
            0.0,
        );
        assert_eq!(decision.alert_level, AlertLevel::None);
        assert!(decision.contributing_factors.is_empty());
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_combination_threshold_one_escalates_single_signal() {
        let config = FusionConfig {
            combination_threshold: 1,
            critical_duration: 3.0,
        };
        let mut fusion = FusionEngine::new(config);
        let decision = fusion.evaluate(
            EyeState::Drowsy,
            MouthState::Closed,
            HeadState::Normal,
            0.0,
        );
        assert_eq!(decision.alert_level, AlertLevel::High);
    }

    #[test]
    fn test_critical_exactly_at_duration() {
        let mut fusion = engine();
        let high = |f: &mut FusionEngine, t: f64| {
            f.evaluate(EyeState::Drowsy, MouthState::Yawning, HeadState::Normal, t)
                .alert_level
        };

        assert_eq!(high(&mut fusion, 0.0), AlertLevel::High);
        assert_eq!(high(&mut fusion, 2.9), AlertLevel::High);
        assert_eq!(high(&mut fusion, 3.0), AlertLevel::Critical);
        assert_eq!(high(&mut fusion, 4.0), AlertLevel::Critical);
    }

    #[test]
    fn test_single_dip_restarts_escalation() {
        let mut fusion = engine();
        let high = |f: &mut FusionEngine, t: f64| {
            f.evaluate(EyeState::Drowsy, MouthState::Yawning, HeadState::Normal, t)
                .alert_level
        };

        assert_eq!(high(&mut fusion, 0.0), AlertLevel::High);
        // One frame below HIGH at t=2.9 clears all progress
        let dip = fusion.evaluate(EyeState::Open, MouthState::Closed, HeadState::Normal, 2.9);
        assert_eq!(dip.alert_level, AlertLevel::None);

        assert_eq!(high(&mut fusion, 3.0), AlertLevel::High, "timer restarted");
        assert_eq!(high(&mut fusion, 5.9), AlertLevel::High);
        assert_eq!(high(&mut fusion, 6.0), AlertLevel::Critical);
    }

    #[test]
    fn test_confidence_base_plus_boosts() {
        let mut fusion = engine();
        // Two high-risk signals: HIGH base 0.8 + 2 * 0.1
        let decision = fusion.evaluate(
            EyeState::Drowsy,
            MouthState::Yawning,
            HeadState::Normal,
            0.0,
        );
        assert!((decision.confidence - 1.0).abs() < 1e-12);

        fusion.reset();
        // One high-risk signal: MEDIUM base 0.6 + 0.1
        let decision = fusion.evaluate(
            EyeState::Drowsy,
            MouthState::Closed,
            HeadState::Normal,
            10.0,
        );
        assert!((decision.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_contributing_factors_name_active_high_risk_states() {
        let mut fusion = engine();
        let decision = fusion.evaluate(
            EyeState::Drowsy,
            MouthState::WideOpen,
            HeadState::HeadDownDrowsy,
            0.0,
        );
        assert_eq!(
            decision.contributing_factors,
            vec![
                "Eyes closed for extended period",
                "Head down for extended period"
            ]
        );
    }

    #[test]
    fn test_confidence_is_capped() {
        let config = FusionConfig {
            combination_threshold: 3,
            critical_duration: 3.0,
        };
        let mut fusion = FusionEngine::new(config);
        let decision = fusion.evaluate(
            EyeState::Drowsy,
            MouthState::Yawning,
            HeadState::HeadDownDrowsy,
            0.0,
        );
        assert_eq!(decision.alert_level, AlertLevel::High);
        assert!(decision.confidence <= 1.0);
    }
}
