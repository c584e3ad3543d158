//! Magnet calibration: target field to drive current.
//!
//! The electromagnet was characterized by fitting drive current against the
//! measured field; the fit is carried here as a cubic polynomial. Fields
//! below zero or below the calibration threshold produce zero current.

use crate::error::{SweepError, SweepResult};

/// Constant term of the shipped calibration fit, in amperes.
pub const DEFAULT_OFFSET_AMPS: f64 = -6.789_515_87e-6;

/// First-order term of the shipped calibration fit, in amperes per tesla.
pub const DEFAULT_LINEAR_AMPS_PER_TESLA: f64 = 3.275_499_22e-3;

/// Polynomial mapping a target field (T) to a drive current (A).
///
/// All four coefficients must be supplied and finite at construction; a
/// calibration with missing higher-order terms is a configuration error, not
/// a runtime fallback. The shipped [`Default`] carries the measured
/// offset/linear terms with explicit zero quadratic and cubic terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldCalibration {
    /// Fields below this value (T) produce zero current.
    threshold_tesla: f64,
    offset: f64,
    linear: f64,
    quadratic: f64,
    cubic: f64,
}

impl FieldCalibration {
    /// Build a calibration, validating every coefficient is finite.
    pub fn new(
        threshold_tesla: f64,
        offset: f64,
        linear: f64,
        quadratic: f64,
        cubic: f64,
    ) -> SweepResult<Self> {
        let coefficients = [
            ("threshold", threshold_tesla),
            ("offset", offset),
            ("linear", linear),
            ("quadratic", quadratic),
            ("cubic", cubic),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() {
                return Err(SweepError::InvalidRange(format!(
                    "calibration coefficient '{name}' is not finite: {value}"
                )));
            }
        }
        Ok(Self {
            threshold_tesla,
            offset,
            linear,
            quadratic,
            cubic,
        })
    }

    /// Drive current (A) needed to produce `field_tesla`.
    ///
    /// Negative fields and fields below the calibration threshold clamp to
    /// zero current.
    pub fn current_for(&self, field_tesla: f64) -> f64 {
        if field_tesla < 0.0 || field_tesla < self.threshold_tesla {
            return 0.0;
        }
        let b = field_tesla;
        self.offset + b * self.linear + b * b * self.quadratic + b * b * b * self.cubic
    }
}

impl Default for FieldCalibration {
    fn default() -> Self {
        // Constants above are finite by inspection, so construct directly.
        Self {
            threshold_tesla: DEFAULT_OFFSET_AMPS,
            offset: DEFAULT_OFFSET_AMPS,
            linear: DEFAULT_LINEAR_AMPS_PER_TESLA,
            quadratic: 0.0,
            cubic: 0.0,
        }
    }
}
