//! Fusion and escalation engine.
//!
//! This crate combines the three per-signal categorical states into one
//! graded alert level with duration-based escalation, and owns the
//! per-session state (classifiers, detection history, statistics) that the
//! pipeline's detection stage drives frame by frame.

pub mod fusion;
pub mod session;

pub use fusion::{FusionDecision, FusionEngine};
pub use session::{Session, SessionSummary};
