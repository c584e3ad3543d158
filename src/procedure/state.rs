//! Run lifecycle types: engine state machine, samples, and run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Procedure engine execution state.
///
/// # State machine
///
/// ```text
/// Idle ─> Starting ─> RampingField ─> Sweeping ─> ShuttingDown ─┬─> Completed
///            │              │             │                     ├─> Cancelled
///            └──────────────┴─────────────┴── (error/cancel) ───┴─> Faulted
/// ```
///
/// Every path into a terminal state passes through `ShuttingDown`; terminal
/// states are final and an engine instance is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Constructed, not yet started.
    Idle,
    /// Acquiring hardware and homing the rotation stage.
    Starting,
    /// Ramping the magnet current and configuring the drive lock-in.
    RampingField,
    /// Stepping through the angle sequence.
    Sweeping,
    /// Ramping down (if configured) and releasing hardware.
    ShuttingDown,
    /// Terminal: sweep finished normally.
    Completed,
    /// Terminal: cancellation observed; partial results preserved.
    Cancelled,
    /// Terminal: unrecoverable error; partial results preserved.
    Faulted,
}

impl EngineState {
    /// True for the three final states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineState::Completed | EngineState::Cancelled | EngineState::Faulted
        )
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Starting => write!(f, "Starting"),
            EngineState::RampingField => write!(f, "RampingField"),
            EngineState::Sweeping => write!(f, "Sweeping"),
            EngineState::ShuttingDown => write!(f, "ShuttingDown"),
            EngineState::Completed => write!(f, "Completed"),
            EngineState::Cancelled => write!(f, "Cancelled"),
            EngineState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// One measurement point. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Measured stage angle (deg), read back rather than commanded.
    pub angle_deg: f64,
    /// Magnet drive current (A) for this run.
    pub current_amps: f64,
    /// Applied field (T) for this run.
    pub field_tesla: f64,
    /// Lock-in 1 in-phase voltage (V).
    pub x1_volts: f64,
    /// Lock-in 1 quadrature voltage (V).
    pub y1_volts: f64,
    /// Lock-in 2 in-phase voltage (V).
    pub x2_volts: f64,
    /// Lock-in 2 quadrature voltage (V).
    pub y2_volts: f64,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every planned angle was measured.
    Completed,
    /// Cancellation was observed; samples up to that point are valid.
    Cancelled,
    /// An unrecoverable error ended the run; prior samples are valid.
    Faulted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Cancelled => write!(f, "Cancelled"),
            RunStatus::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Applied field (T) this run measured at.
    pub field_tesla: f64,
    /// Samples in acquisition order. Preserved on cancellation and fault.
    pub samples: Vec<Sample>,
    /// Terminal status.
    pub status: RunStatus,
    /// Fault description when `status` is [`RunStatus::Faulted`].
    pub fault: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal state.
    pub finished_at: DateTime<Utc>,
}
