//! Measurement configuration.
//!
//! A [`MeasurementConfig`] is a plain immutable record, decoupled from any
//! presentation layer. Every field has a declared default so a partial TOML
//! file (or an empty one) is usable; [`MeasurementConfig::validate`] checks
//! the cross-field invariants once, before any hardware is touched.

use crate::error::{SweepError, SweepResult};
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable configuration for one measurement campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Directory the result sink writes into.
    #[serde(default = "default_file_root")]
    pub file_root: PathBuf,

    /// Prefix for result file names.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Applied field (T) for a single-field campaign.
    #[serde(default = "default_field")]
    pub field: f64,

    /// Drive lock-in excitation amplitude (V).
    #[serde(default = "default_lockin_amplitude")]
    pub lockin_amplitude: f64,

    /// Drive lock-in reference frequency (Hz).
    #[serde(default = "default_lockin_frequency")]
    pub lockin_frequency: f64,

    /// First commanded angle (deg).
    #[serde(default)]
    pub start_angle: f64,

    /// Last commanded angle (deg), inclusive when reachable by whole steps.
    #[serde(default = "default_stop_angle")]
    pub stop_angle: f64,

    /// Angle increment (deg), must be positive.
    #[serde(default = "default_angle_step")]
    pub angle_step: f64,

    /// Wait between motion settling and the lock-in reads.
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,

    /// Sweep several fields with reciprocal-linear spacing instead of the
    /// single `field` value.
    #[serde(default)]
    pub inverse_spacing: bool,

    /// First field (T) of an inverse-spaced sweep. Must be nonzero.
    #[serde(default = "default_field_start")]
    pub field_start: f64,

    /// Last field (T) of an inverse-spaced sweep. Must be nonzero.
    #[serde(default = "default_field_stop")]
    pub field_stop: f64,

    /// Number of fields in an inverse-spaced sweep.
    #[serde(default = "default_field_steps")]
    pub field_steps: usize,

    /// Ramp the field back to zero when the run ends.
    #[serde(default)]
    pub shutdown_after: bool,
}

fn default_file_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_file_prefix() -> String {
    "2ndHarm".to_string()
}
fn default_field() -> f64 {
    0.1
}
fn default_lockin_amplitude() -> f64 {
    1.0
}
fn default_lockin_frequency() -> f64 {
    1337.7
}
fn default_stop_angle() -> f64 {
    270.0
}
fn default_angle_step() -> f64 {
    1.0
}
fn default_delay() -> Duration {
    Duration::from_millis(100)
}
fn default_field_start() -> f64 {
    0.05
}
fn default_field_stop() -> f64 {
    0.3
}
fn default_field_steps() -> usize {
    10
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            file_root: default_file_root(),
            file_prefix: default_file_prefix(),
            field: default_field(),
            lockin_amplitude: default_lockin_amplitude(),
            lockin_frequency: default_lockin_frequency(),
            start_angle: 0.0,
            stop_angle: default_stop_angle(),
            angle_step: default_angle_step(),
            delay: default_delay(),
            inverse_spacing: false,
            field_start: default_field_start(),
            field_stop: default_field_stop(),
            field_steps: default_field_steps(),
            shutdown_after: false,
        }
    }
}

impl MeasurementConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> SweepResult<Self> {
        let settings = Config::builder()
            .add_source(config::File::from(path))
            .build()?;
        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check the cross-field invariants.
    pub fn validate(&self) -> SweepResult<()> {
        if !self.angle_step.is_finite() || self.angle_step <= 0.0 {
            return Err(SweepError::InvalidRange(format!(
                "angle_step must be positive, got {}",
                self.angle_step
            )));
        }
        if self.stop_angle < self.start_angle {
            return Err(SweepError::InvalidRange(format!(
                "stop_angle {} is below start_angle {}",
                self.stop_angle, self.start_angle
            )));
        }
        if self.field_steps < 1 {
            return Err(SweepError::InvalidRange(
                "field_steps must be at least 1".to_string(),
            ));
        }
        if self.inverse_spacing && (self.field_start == 0.0 || self.field_stop == 0.0) {
            return Err(SweepError::InvalidRange(
                "inverse spacing requires nonzero field_start and field_stop".to_string(),
            ));
        }
        if self.lockin_frequency <= 0.0 {
            return Err(SweepError::InvalidRange(format!(
                "lockin_frequency must be positive, got {}",
                self.lockin_frequency
            )));
        }
        Ok(())
    }

    /// Copy of this configuration with a different applied field.
    ///
    /// Used by the run queue to build one engine per planned field value.
    pub fn with_field(&self, field_tesla: f64) -> Self {
        Self {
            field: field_tesla,
            ..self.clone()
        }
    }
}
