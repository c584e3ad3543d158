//! The instrument bundle: current source plus the two lock-in amplifiers.
//!
//! Groups the non-motion hardware behind one façade and maps transient I/O
//! failures onto the run-level error taxonomy. Unlike the motion layer there
//! is no retry here: these are fast, low-fault-rate paths, and an error is
//! fatal to the current run.

use crate::error::{SweepError, SweepResult};
use crate::hardware::capabilities::{CurrentSource, LockinAmplifier};
use std::sync::Arc;
use tracing::debug;

/// Which lock-in amplifier to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockinChannel {
    /// The drive amplifier (also the excitation source).
    One,
    /// The second, measure-only amplifier.
    Two,
}

impl LockinChannel {
    fn number(self) -> u8 {
        match self {
            LockinChannel::One => 1,
            LockinChannel::Two => 2,
        }
    }
}

/// Current source and lock-in amplifiers for one run.
///
/// Handles are `Arc`s so the queue can hand the same physical instruments to
/// consecutive (never concurrent) runs.
#[derive(Clone)]
pub struct InstrumentBundle {
    source: Arc<dyn CurrentSource>,
    lockin_one: Arc<dyn LockinAmplifier>,
    lockin_two: Arc<dyn LockinAmplifier>,
}

impl InstrumentBundle {
    /// Bundle the three instrument handles.
    pub fn new(
        source: Arc<dyn CurrentSource>,
        lockin_one: Arc<dyn LockinAmplifier>,
        lockin_two: Arc<dyn LockinAmplifier>,
    ) -> Self {
        Self {
            source,
            lockin_one,
            lockin_two,
        }
    }

    /// Issue a current ramp command.
    ///
    /// Returns once the command is accepted; ramp completion is handled by
    /// the caller's settle delay.
    pub async fn ramp_current(
        &self,
        target_amps: f64,
        rate_amps_per_sec: Option<f64>,
    ) -> SweepResult<()> {
        debug!(target_amps, ?rate_amps_per_sec, "ramping current");
        self.source
            .ramp_to_current(target_amps, rate_amps_per_sec)
            .await
            .map_err(|source| SweepError::Command {
                device: "current source",
                source,
            })
    }

    /// Configure the drive lock-in's excitation amplitude and frequency.
    pub async fn set_excitation(&self, amplitude_volts: f64, frequency_hertz: f64) -> SweepResult<()> {
        debug!(amplitude_volts, frequency_hertz, "configuring drive lock-in");
        self.lockin_one
            .set_amplitude(amplitude_volts)
            .await
            .map_err(|source| SweepError::Command {
                device: "drive lock-in",
                source,
            })?;
        self.lockin_one
            .set_frequency(frequency_hertz)
            .await
            .map_err(|source| SweepError::Command {
                device: "drive lock-in",
                source,
            })
    }

    /// Read one amplifier's `(X, Y)` pair. Single attempt, no retry.
    pub async fn read_xy(&self, channel: LockinChannel) -> SweepResult<(f64, f64)> {
        let lockin = match channel {
            LockinChannel::One => &self.lockin_one,
            LockinChannel::Two => &self.lockin_two,
        };
        let x = lockin.read_x().await.map_err(|source| SweepError::Read {
            channel: channel.number(),
            source,
        })?;
        let y = lockin.read_y().await.map_err(|source| SweepError::Read {
            channel: channel.number(),
            source,
        })?;
        Ok((x, y))
    }
}
