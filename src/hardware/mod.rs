//! Hardware capability traits and simulated drivers.

pub mod capabilities;
pub mod mock;

pub use capabilities::{CurrentSource, HwResult, LockinAmplifier, MotionState, RotationStage};
