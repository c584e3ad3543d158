//! The procedure engine: one field value, one angle sweep, one result.
//!
//! The engine is a sequential state machine over injected hardware handles.
//! It exclusively owns those handles for the duration of the run (taken at
//! construction, released when `run` consumes the engine), so a fault in any
//! state still reaches the shutdown step before anything is dropped.

use crate::calibration::FieldCalibration;
use crate::cancel::CancelToken;
use crate::config::MeasurementConfig;
use crate::error::{SweepError, SweepResult};
use crate::hardware::capabilities::RotationStage;
use crate::procedure::bench::{InstrumentBundle, LockinChannel};
use crate::procedure::motion::{MotionController, RetryPolicy};
use crate::procedure::state::{EngineState, RunResult, RunStatus, Sample};
use crate::sink::RunObserver;
use crate::sweep;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Wait after a ramp command for the field to settle before measuring.
const FIELD_SETTLE: Duration = Duration::from_secs(1);

/// Time constant for the protective startup/shutdown ramp: the bounded rate
/// is `current / RAMP_TIME_CONST_SECS`, so large steps ramp over ~100 ms.
const RAMP_TIME_CONST_SECS: f64 = 0.1;

/// Sequences one run: startup, field ramp, angle sweep, shutdown.
///
/// Terminal states are final; an engine instance is never reused. Build a
/// fresh one per field value (see [`crate::queue::RunQueue`]).
pub struct ProcedureEngine {
    config: MeasurementConfig,
    current_amps: f64,
    angles: Vec<f64>,
    motion: MotionController,
    bench: InstrumentBundle,
    observer: Arc<dyn RunObserver>,
    cancel: CancelToken,
    state: EngineState,
}

impl ProcedureEngine {
    /// Validate the configuration, plan the sweep, and take ownership of the
    /// hardware handles.
    ///
    /// All range errors surface here, before any hardware is touched.
    pub fn new(
        config: MeasurementConfig,
        calibration: &FieldCalibration,
        stage: Arc<dyn RotationStage>,
        bench: InstrumentBundle,
        observer: Arc<dyn RunObserver>,
        cancel: CancelToken,
        policy: RetryPolicy,
    ) -> SweepResult<Self> {
        config.validate()?;
        let angles = sweep::build_angles(config.start_angle, config.stop_angle, config.angle_step)?;
        let current_amps = calibration.current_for(config.field);
        Ok(Self {
            config,
            current_amps,
            angles,
            motion: MotionController::new(stage, policy, cancel.clone()),
            bench,
            observer,
            cancel,
            state: EngineState::Idle,
        })
    }

    /// Current state of the engine's lifecycle.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Execute the run to its terminal state.
    ///
    /// Never skips shutdown: whatever happens during startup, ramping, or
    /// sweeping, the field is ramped down (when configured) and the hardware
    /// handles are released when the engine is dropped at return.
    pub async fn run(mut self) -> RunResult {
        let started_at = Utc::now();
        let mut samples = Vec::with_capacity(self.angles.len());

        info!(
            field_tesla = self.config.field,
            current_amps = self.current_amps,
            angles = self.angles.len(),
            "starting run"
        );

        let outcome = self.measure(&mut samples).await;

        let (mut status, mut fault) = match outcome {
            Ok(()) => (RunStatus::Completed, None),
            Err(SweepError::Cancelled) => {
                info!("cancellation observed, shutting down");
                (RunStatus::Cancelled, None)
            }
            Err(err) => {
                warn!(%err, "run faulted");
                (RunStatus::Faulted, Some(err.to_string()))
            }
        };

        self.state = EngineState::ShuttingDown;
        if let Err(err) = self.shutdown().await {
            warn!(%err, "shutdown step failed");
            if status == RunStatus::Completed {
                status = RunStatus::Faulted;
                fault = Some(err.to_string());
            }
        }

        self.state = match status {
            RunStatus::Completed => EngineState::Completed,
            RunStatus::Cancelled => EngineState::Cancelled,
            RunStatus::Faulted => EngineState::Faulted,
        };
        info!(
            status = %status,
            samples = samples.len(),
            "run finished"
        );

        RunResult {
            field_tesla: self.config.field,
            samples,
            status,
            fault,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Starting → RampingField → Sweeping. Errors propagate to `run`, which
    /// classifies them and always proceeds to shutdown.
    async fn measure(&mut self, samples: &mut Vec<Sample>) -> SweepResult<()> {
        self.state = EngineState::Starting;
        info!("homing rotation stage");
        self.motion.home_and_wait().await.map_err(|err| match err {
            SweepError::Cancelled => SweepError::Cancelled,
            other => SweepError::Acquisition {
                device: "rotation stage",
                source: Box::new(other),
            },
        })?;

        self.state = EngineState::RampingField;
        info!(current_amps = self.current_amps, "ramping to field value");
        if self.current_amps > 0.0 {
            // Protective bounded ramp first, then settle onto the exact target.
            let bounded_rate = self.current_amps / RAMP_TIME_CONST_SECS;
            self.bench
                .ramp_current(self.current_amps, Some(bounded_rate))
                .await?;
        }
        self.bench.ramp_current(self.current_amps, None).await?;
        sleep(FIELD_SETTLE).await;

        info!("setting lock-in parameters");
        self.bench
            .set_excitation(self.config.lockin_amplitude, self.config.lockin_frequency)
            .await?;

        self.state = EngineState::Sweeping;
        info!("starting to sweep through angle");
        let total = self.angles.len();
        let angles = std::mem::take(&mut self.angles);
        for (index, angle) in angles.into_iter().enumerate() {
            debug!(angle, "setting angle");
            self.motion.move_to_and_wait(angle).await?;
            let measured_angle = self.motion.read_position().await?;
            sleep(self.config.delay).await;

            let (x1, y1) = self.bench.read_xy(LockinChannel::One).await?;
            let (x2, y2) = self.bench.read_xy(LockinChannel::Two).await?;
            let sample = Sample {
                angle_deg: measured_angle,
                current_amps: self.current_amps,
                field_tesla: self.config.field,
                x1_volts: x1,
                y1_volts: y1,
                x2_volts: x2,
                y2_volts: y2,
            };
            self.observer.on_sample(&sample);
            samples.push(sample);
            self.observer
                .on_progress(100.0 * (index + 1) as f64 / total as f64);

            if self.cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
        }
        Ok(())
    }

    /// Ramp the field down when configured. Runs on every exit path.
    async fn shutdown(&mut self) -> SweepResult<()> {
        info!("shutting down");
        if self.config.shutdown_after {
            let bounded_rate = self.current_amps / RAMP_TIME_CONST_SECS;
            self.bench.ramp_current(0.0, Some(bounded_rate)).await?;
            sleep(FIELD_SETTLE).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{MockCurrentSource, MockLockin, MockRotationStage};
    use crate::sink::MemorySink;

    struct Rig {
        stage: Arc<MockRotationStage>,
        source: Arc<MockCurrentSource>,
        lockin_one: Arc<MockLockin>,
        lockin_two: Arc<MockLockin>,
        sink: Arc<MemorySink>,
        cancel: CancelToken,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                stage: Arc::new(MockRotationStage::new()),
                source: Arc::new(MockCurrentSource::new()),
                lockin_one: Arc::new(MockLockin::with_reading(0.1, 0.2)),
                lockin_two: Arc::new(MockLockin::with_reading(0.3, 0.4)),
                sink: Arc::new(MemorySink::new()),
                cancel: CancelToken::new(),
            }
        }

        fn engine(&self, config: MeasurementConfig) -> ProcedureEngine {
            let bench = InstrumentBundle::new(
                self.source.clone(),
                self.lockin_one.clone(),
                self.lockin_two.clone(),
            );
            ProcedureEngine::new(
                config,
                &FieldCalibration::default(),
                self.stage.clone(),
                bench,
                self.sink.clone(),
                self.cancel.clone(),
                RetryPolicy::default(),
            )
            .unwrap()
        }
    }

    fn three_angle_config() -> MeasurementConfig {
        MeasurementConfig {
            start_angle: 0.0,
            stop_angle: 2.0,
            angle_step: 1.0,
            field: 0.1,
            shutdown_after: false,
            ..MeasurementConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn engine_starts_idle_and_ends_terminal() {
        let rig = Rig::new();
        let engine = rig.engine(three_angle_config());
        assert_eq!(engine.state(), EngineState::Idle);
        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn samples_carry_corrected_channel_wiring() {
        let rig = Rig::new();
        let result = rig.engine(three_angle_config()).run().await;
        let sample = &result.samples[0];
        assert_eq!((sample.x1_volts, sample.y1_volts), (0.1, 0.2));
        assert_eq!((sample.x2_volts, sample.y2_volts), (0.3, 0.4));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_reaches_one_hundred() {
        let rig = Rig::new();
        rig.engine(three_angle_config()).run().await;
        let progress = rig.sink.progress();
        assert_eq!(progress.len(), 3);
        assert!((progress[2] - 100.0).abs() < 1e-9);
        assert!(progress.windows(2).all(|p| p[0] < p[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_rejected_before_hardware() {
        let rig = Rig::new();
        let config = MeasurementConfig {
            angle_step: -1.0,
            ..MeasurementConfig::default()
        };
        let bench = InstrumentBundle::new(
            rig.source.clone(),
            rig.lockin_one.clone(),
            rig.lockin_two.clone(),
        );
        let result = ProcedureEngine::new(
            config,
            &FieldCalibration::default(),
            rig.stage.clone(),
            bench,
            rig.sink.clone(),
            rig.cancel.clone(),
            RetryPolicy::default(),
        );
        assert!(matches!(result, Err(SweepError::InvalidRange(_))));
        assert_eq!(rig.stage.home_attempts(), 0);
        assert!(rig.source.ramps().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn startup_performs_bounded_then_exact_ramp() {
        let rig = Rig::new();
        rig.engine(three_angle_config()).run().await;
        let ramps = rig.source.ramps().await;
        assert_eq!(ramps.len(), 2);
        let expected = FieldCalibration::default().current_for(0.1);
        assert_eq!(ramps[0].0, expected);
        assert!(ramps[0].1.is_some());
        assert_eq!(ramps[1], (expected, None));
    }
}
