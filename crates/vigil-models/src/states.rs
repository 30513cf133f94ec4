//! Categorical signal states and alert levels.
//!
//! Each physiological signal classifies into its own small state enum; the
//! fusion engine folds the three of them into an [`AlertLevel`] and the 1:1
//! [`FatigueState`] shown to the driver.

use serde::{Deserialize, Serialize};

/// Eye state derived from the eye aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EyeState {
    /// Eyes open, EAR above the blink threshold
    #[default]
    Open,
    /// Short closure still within the blink frame window
    Blinking,
    /// EAR below threshold but drowsy duration not yet reached
    Closing,
    /// EAR held below the drowsy threshold for the configured duration
    Drowsy,
}

/// Mouth state derived from the mouth aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MouthState {
    #[default]
    Closed,
    /// MAR above the speaking threshold but below the yawn threshold
    Speaking,
    /// Transitional opening, reported by some providers between speech and yawn
    SlightlyOpen,
    /// MAR above the yawn threshold, sustained duration not yet reached
    WideOpen,
    /// MAR held above the yawn threshold for the configured duration
    Yawning,
}

/// Head state derived from the pose pitch angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeadState {
    #[default]
    Normal,
    /// |pitch| above the normal threshold but below the drowsy threshold
    SlightlyTilted,
    /// |pitch| above the drowsy threshold, sustained duration not yet reached
    Tilted,
    /// Sustained downward tilt short of the drowsy duration
    HeadDown,
    /// |pitch| held above the drowsy threshold for the configured duration
    HeadDownDrowsy,
}

impl EyeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EyeState::Open => "open",
            EyeState::Blinking => "blinking",
            EyeState::Closing => "closing",
            EyeState::Drowsy => "drowsy",
        }
    }

    /// Whether this state counts as high-risk in fusion.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, EyeState::Drowsy)
    }

    /// Whether this state counts as medium-risk in fusion.
    pub fn is_medium_risk(&self) -> bool {
        matches!(self, EyeState::Closing)
    }

    /// Human-readable contributing factor, present for high-risk states.
    pub fn contributing_factor(&self) -> Option<&'static str> {
        match self {
            EyeState::Drowsy => Some("Eyes closed for extended period"),
            _ => None,
        }
    }
}

impl MouthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouthState::Closed => "closed",
            MouthState::Speaking => "speaking",
            MouthState::SlightlyOpen => "slightly_open",
            MouthState::WideOpen => "wide_open",
            MouthState::Yawning => "yawning",
        }
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(self, MouthState::Yawning)
    }

    pub fn is_medium_risk(&self) -> bool {
        matches!(self, MouthState::WideOpen)
    }

    pub fn contributing_factor(&self) -> Option<&'static str> {
        match self {
            MouthState::Yawning => Some("Yawning detected"),
            _ => None,
        }
    }
}

impl HeadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadState::Normal => "normal",
            HeadState::SlightlyTilted => "slightly_tilted",
            HeadState::Tilted => "tilted",
            HeadState::HeadDown => "head_down",
            HeadState::HeadDownDrowsy => "head_down_drowsy",
        }
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(self, HeadState::HeadDownDrowsy)
    }

    pub fn is_medium_risk(&self) -> bool {
        matches!(self, HeadState::Tilted | HeadState::HeadDown)
    }

    pub fn contributing_factor(&self) -> Option<&'static str> {
        match self {
            HeadState::HeadDownDrowsy => Some("Head down for extended period"),
            _ => None,
        }
    }
}

/// Graded alert level produced by the fusion engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    /// HIGH sustained past the critical escalation duration
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }

    /// Whether this level should reach the alert/notification sink.
    pub fn is_alerting(&self) -> bool {
        matches!(self, AlertLevel::High | AlertLevel::Critical)
    }

    /// Base confidence contribution for this level.
    pub fn base_confidence(&self) -> f64 {
        match self {
            AlertLevel::None => 0.0,
            AlertLevel::Low => 0.3,
            AlertLevel::Medium => 0.6,
            AlertLevel::High => 0.8,
            AlertLevel::Critical => 1.0,
        }
    }

    /// Driver-facing recommendation for this level.
    pub fn recommendation(&self) -> &'static str {
        match self {
            AlertLevel::None => "Continue driving safely",
            AlertLevel::Low => "Slight fatigue detected - Stay alert",
            AlertLevel::Medium => "Moderate fatigue - Take a break soon",
            AlertLevel::High => "High fatigue detected - Consider taking a break",
            AlertLevel::Critical => "STOP DRIVING IMMEDIATELY - Find safe place to rest",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Driver fatigue state, a 1:1 mapping from the alert level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FatigueState {
    #[default]
    Awake,
    SlightlyTired,
    ModeratelyTired,
    SeverelyTired,
    DangerouslyDrowsy,
}

impl FatigueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueState::Awake => "awake",
            FatigueState::SlightlyTired => "slightly_tired",
            FatigueState::ModeratelyTired => "moderately_tired",
            FatigueState::SeverelyTired => "severely_tired",
            FatigueState::DangerouslyDrowsy => "dangerously_drowsy",
        }
    }
}

impl From<AlertLevel> for FatigueState {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::None => FatigueState::Awake,
            AlertLevel::Low => FatigueState::SlightlyTired,
            AlertLevel::Medium => FatigueState::ModeratelyTired,
            AlertLevel::High => FatigueState::SeverelyTired,
            AlertLevel::Critical => FatigueState::DangerouslyDrowsy,
        }
    }
}

impl std::fmt::Display for FatigueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
