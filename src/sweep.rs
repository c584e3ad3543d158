//! Sweep planning: angle and field sequences from configuration.
//!
//! Planning is pure and happens before any hardware is touched, so a bad
//! range is rejected as [`SweepError::InvalidRange`] without side effects.

use crate::config::MeasurementConfig;
use crate::error::{SweepError, SweepResult};

/// The concrete sequences one measurement campaign will execute.
///
/// `fields` has one entry per queued run; `angles` is shared by every run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Ordered field magnitudes (T), one run each.
    pub fields: Vec<f64>,
    /// Ordered commanded angles (deg) within a run.
    pub angles: Vec<f64>,
}

impl SweepPlan {
    /// Build the full plan for a validated configuration.
    pub fn from_config(config: &MeasurementConfig) -> SweepResult<Self> {
        Ok(Self {
            fields: build_fields(config)?,
            angles: build_angles(config.start_angle, config.stop_angle, config.angle_step)?,
        })
    }
}

/// Ordered angle sequence: `start, start + step, ...`, inclusive of `stop`
/// when it is reachable by whole steps, and never reaching `stop + step`.
pub fn build_angles(start: f64, stop: f64, step: f64) -> SweepResult<Vec<f64>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(SweepError::InvalidRange(format!(
            "angle step must be positive, got {step}"
        )));
    }
    if !start.is_finite() || !stop.is_finite() {
        return Err(SweepError::InvalidRange(format!(
            "angle bounds must be finite, got {start}..{stop}"
        )));
    }
    if stop < start {
        return Err(SweepError::InvalidRange(format!(
            "stop angle {stop} is below start angle {start}"
        )));
    }

    // Index multiplication instead of accumulation keeps long sweeps exact.
    let limit = stop + step;
    let mut angles = Vec::new();
    let mut k = 0u64;
    loop {
        let angle = start + k as f64 * step;
        if angle >= limit {
            break;
        }
        angles.push(angle);
        k += 1;
    }
    Ok(angles)
}

/// Ordered field sequence for the campaign.
///
/// Without inverse spacing this is the singleton `[config.field]`. With it,
/// `field_steps` values whose reciprocals are evenly spaced between
/// `1/field_start` and `1/field_stop` (harmonic spacing, uniform in the
/// inverse physical quantity).
pub fn build_fields(config: &MeasurementConfig) -> SweepResult<Vec<f64>> {
    if !config.inverse_spacing {
        return Ok(vec![config.field]);
    }

    let count = config.field_steps;
    if count < 1 {
        return Err(SweepError::InvalidRange(format!(
            "field step count must be at least 1, got {count}"
        )));
    }
    if config.field_start == 0.0 || config.field_stop == 0.0 {
        return Err(SweepError::InvalidRange(
            "inverse spacing requires nonzero field bounds".to_string(),
        ));
    }

    let inverse_start = 1.0 / config.field_start;
    let inverse_stop = 1.0 / config.field_stop;
    let fields = if count == 1 {
        vec![config.field_start]
    } else {
        let span = inverse_stop - inverse_start;
        (0..count)
            .map(|i| {
                let reciprocal = inverse_start + span * i as f64 / (count - 1) as f64;
                1.0 / reciprocal
            })
            .collect()
    };
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeasurementConfig;

    fn inverse_config(start: f64, stop: f64, steps: usize) -> MeasurementConfig {
        MeasurementConfig {
            inverse_spacing: true,
            field_start: start,
            field_stop: stop,
            field_steps: steps,
            ..MeasurementConfig::default()
        }
    }

    #[test]
    fn angles_start_at_start_and_are_step_spaced() {
        let angles = build_angles(0.0, 270.0, 1.0).unwrap();
        assert_eq!(angles.len(), 271);
        assert_eq!(angles[0], 0.0);
        assert_eq!(angles[270], 270.0);
        for pair in angles.windows(2) {
            assert!((pair[1] - pair[0] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn stop_included_when_reachable_by_whole_steps() {
        let angles = build_angles(0.0, 2.0, 1.0).unwrap();
        assert_eq!(angles, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn unreachable_stop_ends_before_stop_plus_step() {
        let angles = build_angles(0.0, 1.0, 0.4).unwrap();
        // arange semantics: 0.0, 0.4, 0.8, 1.2 (< 1.4)
        assert_eq!(angles.len(), 4);
        let last = angles[angles.len() - 1];
        assert!(last <= 1.0 + 0.4);
        assert!((last - 1.2).abs() < 1e-9);
    }

    #[test]
    fn non_positive_step_is_rejected() {
        assert!(matches!(
            build_angles(0.0, 10.0, 0.0),
            Err(SweepError::InvalidRange(_))
        ));
        assert!(matches!(
            build_angles(0.0, 10.0, -1.0),
            Err(SweepError::InvalidRange(_))
        ));
    }

    #[test]
    fn descending_range_is_rejected() {
        assert!(matches!(
            build_angles(90.0, 0.0, 1.0),
            Err(SweepError::InvalidRange(_))
        ));
    }

    #[test]
    fn single_field_without_inverse_spacing() {
        let config = MeasurementConfig {
            field: 0.17,
            ..MeasurementConfig::default()
        };
        assert_eq!(build_fields(&config).unwrap(), vec![0.17]);
    }

    #[test]
    fn inverse_spacing_has_evenly_spaced_reciprocals() {
        let fields = build_fields(&inverse_config(0.05, 0.3, 10)).unwrap();
        assert_eq!(fields.len(), 10);
        assert!((fields[0] - 0.05).abs() < 1e-12);
        assert!((fields[9] - 0.3).abs() < 1e-12);

        let reciprocals: Vec<f64> = fields.iter().map(|f| 1.0 / f).collect();
        let spacing = reciprocals[1] - reciprocals[0];
        for pair in reciprocals.windows(2) {
            assert!((pair[1] - pair[0] - spacing).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_field_bound_is_rejected() {
        assert!(matches!(
            build_fields(&inverse_config(0.0, 0.3, 10)),
            Err(SweepError::InvalidRange(_))
        ));
        assert!(matches!(
            build_fields(&inverse_config(0.05, 0.0, 10)),
            Err(SweepError::InvalidRange(_))
        ));
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(matches!(
            build_fields(&inverse_config(0.05, 0.3, 0)),
            Err(SweepError::InvalidRange(_))
        ));
    }

    #[test]
    fn plan_from_config_combines_both_sequences() {
        let config = MeasurementConfig {
            start_angle: 0.0,
            stop_angle: 2.0,
            angle_step: 1.0,
            ..MeasurementConfig::default()
        };
        let plan = SweepPlan::from_config(&config).unwrap();
        assert_eq!(plan.angles, vec![0.0, 1.0, 2.0]);
        assert_eq!(plan.fields, vec![config.field]);
    }
}
