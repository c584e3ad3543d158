//! Sequential run queue: one procedure engine per planned field value.
//!
//! Runs share the same physical hardware, so they execute strictly one after
//! another, never concurrently. Cancellation lets the in-flight run finish
//! its shutdown, then stops the queue.

use crate::calibration::FieldCalibration;
use crate::cancel::CancelToken;
use crate::config::MeasurementConfig;
use crate::error::SweepResult;
use crate::hardware::capabilities::RotationStage;
use crate::procedure::{InstrumentBundle, ProcedureEngine, RetryPolicy, RunResult};
use crate::sink::RunObserver;
use crate::sweep;
use std::sync::Arc;
use tracing::info;

/// Builds and executes the engines for one measurement campaign.
pub struct RunQueue {
    config: MeasurementConfig,
    calibration: FieldCalibration,
    stage: Arc<dyn RotationStage>,
    bench: InstrumentBundle,
    observer: Arc<dyn RunObserver>,
    cancel: CancelToken,
    policy: RetryPolicy,
}

impl RunQueue {
    /// Assemble a queue over shared hardware handles.
    pub fn new(
        config: MeasurementConfig,
        calibration: FieldCalibration,
        stage: Arc<dyn RotationStage>,
        bench: InstrumentBundle,
        observer: Arc<dyn RunObserver>,
        cancel: CancelToken,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            config,
            calibration,
            stage,
            bench,
            observer,
            cancel,
            policy,
        }
    }

    /// Execute every planned run in order and collect their results.
    ///
    /// A single field value yields one run; an inverse-spaced field sweep
    /// yields `field_steps` runs. Planning errors surface before any
    /// hardware is touched.
    pub async fn run_all(&self) -> SweepResult<Vec<RunResult>> {
        self.config.validate()?;
        let fields = sweep::build_fields(&self.config)?;
        info!(runs = fields.len(), "queueing runs");

        let mut results = Vec::with_capacity(fields.len());
        for field_tesla in fields {
            if self.cancel.is_cancelled() {
                info!("queue cancelled before next run");
                break;
            }
            let engine = ProcedureEngine::new(
                self.config.with_field(field_tesla),
                &self.calibration,
                self.stage.clone(),
                self.bench.clone(),
                self.observer.clone(),
                self.cancel.clone(),
                self.policy,
            )?;
            info!(field_tesla, "starting queued run");
            results.push(engine.run().await);
        }
        Ok(results)
    }
}
