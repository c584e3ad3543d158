//! Hardware capability traits.
//!
//! The measurement core never talks to concrete instruments; it consumes
//! these small capability contracts, implemented by external driver crates
//! (or by the mocks in [`crate::hardware::mock`]). Each trait:
//!
//! - is async (`#[async_trait]`) and thread-safe (`Send + Sync`),
//! - takes `&self` (drivers use interior mutability for their state),
//! - returns [`TransientIoError`] for any malformed or timed-out exchange.
//!
//! Whether a transient error is retried is the caller's policy: the motion
//! layer retries rotation-stage operations, everything else treats the error
//! as fatal to the current run.

use crate::error::TransientIoError;
use async_trait::async_trait;
use std::fmt;

/// Result alias for capability methods.
pub type HwResult<T> = std::result::Result<T, TransientIoError>;

/// Motion status reported by a rotation stage. Polled, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// The stage could not classify its own state.
    Unknown,
    /// A move or home is in progress.
    Moving,
    /// Motion complete; position reads are trustworthy.
    AtRest,
    /// Hard fault; the stage needs operator attention.
    Fault,
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionState::Unknown => write!(f, "unknown"),
            MotionState::Moving => write!(f, "moving"),
            MotionState::AtRest => write!(f, "at rest"),
            MotionState::Fault => write!(f, "fault"),
        }
    }
}

/// Capability: sample rotation stage.
///
/// `home` and `move_to` only issue the command; completion is observed by
/// polling `motion_state` until [`MotionState::AtRest`].
#[async_trait]
pub trait RotationStage: Send + Sync {
    /// Issue the homing command.
    async fn home(&self) -> HwResult<()>;

    /// Issue an absolute move to `angle_deg`.
    async fn move_to(&self, angle_deg: f64) -> HwResult<()>;

    /// Query the current position in degrees.
    ///
    /// Only meaningful once the stage reports [`MotionState::AtRest`].
    async fn position(&self) -> HwResult<f64>;

    /// Query the current motion state.
    async fn motion_state(&self) -> HwResult<MotionState>;
}

/// Capability: magnet current source.
#[async_trait]
pub trait CurrentSource: Send + Sync {
    /// Command a ramp to `target_amps`.
    ///
    /// `rate_amps_per_sec` bounds the slew when given; `None` lets the
    /// source use its own closed-loop default. The call returns once the
    /// command is accepted; ramp completion is the caller's concern (fixed
    /// settle delay), matching the hardware's own ramp behavior.
    async fn ramp_to_current(&self, target_amps: f64, rate_amps_per_sec: Option<f64>)
        -> HwResult<()>;
}

/// Capability: lock-in amplifier.
///
/// Exposes the in-phase (X) and quadrature (Y) components of the measured
/// signal, plus excitation control for the amplifier acting as the drive.
#[async_trait]
pub trait LockinAmplifier: Send + Sync {
    /// Set the excitation amplitude in volts.
    async fn set_amplitude(&self, volts: f64) -> HwResult<()>;

    /// Set the reference frequency in hertz.
    async fn set_frequency(&self, hertz: f64) -> HwResult<()>;

    /// Read the in-phase component in volts.
    async fn read_x(&self) -> HwResult<f64>;

    /// Read the quadrature component in volts.
    async fn read_y(&self) -> HwResult<f64>;
}
