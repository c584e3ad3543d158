//! Rotation-stage motion control with bounded retry.
//!
//! Real stages on a shared serial bus intermittently return malformed or
//! timed-out responses. The controller absorbs this by retrying at the point
//! of failure (reissuing the command, or repeating the poll) instead of
//! failing the whole run, trading latency for robustness.
//!
//! Retry is bounded, never infinite: transient-failure retries stop after
//! [`RetryPolicy::max_attempts`] and settling is abandoned after
//! [`RetryPolicy::motion_deadline`], both escalating into run-fatal errors.
//! Cancellation is observed between every iteration, so a wedged instrument
//! can never block a shutdown request.

use crate::cancel::CancelToken;
use crate::error::{SweepError, SweepResult};
use crate::hardware::capabilities::{MotionState, RotationStage};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Bounds on the motion layer's retry and polling loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Transient I/O failures tolerated per operation before escalating.
    pub max_attempts: u32,
    /// Sleep between retries and between motion-state polls.
    pub poll_interval: Duration,
    /// Wall-clock limit on waiting for motion to settle.
    pub motion_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            poll_interval: Duration::from_millis(100),
            motion_deadline: Duration::from_secs(60),
        }
    }
}

enum StageCommand {
    Home,
    MoveTo(f64),
}

impl StageCommand {
    fn name(&self) -> &'static str {
        match self {
            StageCommand::Home => "home command",
            StageCommand::MoveTo(_) => "move command",
        }
    }
}

/// Retry-until-success wrapper over a [`RotationStage`].
///
/// Owns no hardware state of its own; it sequences command issue, settle
/// polling, and position readback against one stage handle.
pub struct MotionController {
    stage: Arc<dyn RotationStage>,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl MotionController {
    /// Wrap a stage handle with the given retry bounds and cancel signal.
    pub fn new(stage: Arc<dyn RotationStage>, policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            stage,
            policy,
            cancel,
        }
    }

    /// Home the stage and block until motion completes.
    pub async fn home_and_wait(&self) -> SweepResult<()> {
        self.issue(StageCommand::Home).await?;
        self.wait_at_rest().await
    }

    /// Move to `angle_deg` and block until motion completes.
    pub async fn move_to_and_wait(&self, angle_deg: f64) -> SweepResult<()> {
        self.issue(StageCommand::MoveTo(angle_deg)).await?;
        self.wait_at_rest().await
    }

    /// Read the true stage position.
    ///
    /// Waits for motion to settle first (same discipline as the move waits),
    /// then retries the query until it yields a finite value.
    pub async fn read_position(&self) -> SweepResult<f64> {
        self.wait_at_rest().await?;

        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            attempts += 1;
            match self.stage.position().await {
                Ok(angle) if angle.is_finite() => return Ok(angle),
                Ok(angle) => {
                    warn!(angle, attempts, "stage returned non-finite position");
                    if attempts >= self.policy.max_attempts {
                        return Err(SweepError::RetriesExhausted {
                            operation: "position query",
                            attempts,
                            source: crate::error::TransientIoError::new(format!(
                                "non-finite position {angle}"
                            )),
                        });
                    }
                }
                Err(err) => {
                    debug!(%err, attempts, "position query failed, retrying");
                    if attempts >= self.policy.max_attempts {
                        return Err(SweepError::RetriesExhausted {
                            operation: "position query",
                            attempts,
                            source: err,
                        });
                    }
                }
            }
            sleep(self.policy.poll_interval).await;
        }
    }

    /// Issue a stage command, retrying transient failures up to the bound.
    async fn issue(&self, command: StageCommand) -> SweepResult<()> {
        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            attempts += 1;
            let outcome = match command {
                StageCommand::Home => self.stage.home().await,
                StageCommand::MoveTo(angle) => self.stage.move_to(angle).await,
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!(%err, attempts, operation = command.name(), "retrying");
                    if attempts >= self.policy.max_attempts {
                        return Err(SweepError::RetriesExhausted {
                            operation: command.name(),
                            attempts,
                            source: err,
                        });
                    }
                }
            }
            sleep(self.policy.poll_interval).await;
        }
    }

    /// Poll the motion state until the stage is at rest.
    ///
    /// Transient poll failures are retried up to the bound; legitimate
    /// motion is limited only by the wall-clock deadline.
    async fn wait_at_rest(&self) -> SweepResult<()> {
        let started = Instant::now();
        let mut io_failures = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            let waited = started.elapsed();
            if waited >= self.policy.motion_deadline {
                return Err(SweepError::MotionTimeout {
                    waited_secs: waited.as_secs_f64(),
                });
            }
            match self.stage.motion_state().await {
                Ok(MotionState::AtRest) => return Ok(()),
                Ok(MotionState::Fault) => return Err(SweepError::StageFault),
                Ok(MotionState::Moving) | Ok(MotionState::Unknown) => {}
                Err(err) => {
                    io_failures += 1;
                    debug!(%err, io_failures, "motion poll failed, retrying");
                    if io_failures >= self.policy.max_attempts {
                        return Err(SweepError::RetriesExhausted {
                            operation: "motion poll",
                            attempts: io_failures,
                            source: err,
                        });
                    }
                }
            }
            sleep(self.policy.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockRotationStage;

    fn controller(
        stage: Arc<MockRotationStage>,
        policy: RetryPolicy,
        cancel: CancelToken,
    ) -> MotionController {
        MotionController::new(stage, policy, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn home_waits_for_settle() {
        let stage = Arc::new(MockRotationStage::with_settle_polls(3));
        let motion = controller(stage.clone(), RetryPolicy::default(), CancelToken::new());
        motion.home_and_wait().await.unwrap();
        assert_eq!(stage.home_attempts(), 1);
        assert_eq!(stage.position().await.unwrap(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn move_retries_transient_failures() {
        let stage = Arc::new(MockRotationStage::new());
        stage.fail_next_moves(2);
        let motion = controller(stage.clone(), RetryPolicy::default(), CancelToken::new());
        motion.move_to_and_wait(30.0).await.unwrap();
        assert_eq!(stage.move_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_escalate() {
        let stage = Arc::new(MockRotationStage::new());
        stage.fail_next_moves(10);
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let motion = controller(stage.clone(), policy, CancelToken::new());
        let err = motion.move_to_and_wait(30.0).await.unwrap_err();
        match err {
            SweepError::RetriesExhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "move command");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stage.move_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_retry_loop() {
        let stage = Arc::new(MockRotationStage::new());
        stage.fail_next_moves(u32::MAX);
        let cancel = CancelToken::new();
        cancel.cancel();
        let motion = controller(stage.clone(), RetryPolicy::default(), cancel);
        assert!(matches!(
            motion.move_to_and_wait(30.0).await,
            Err(SweepError::Cancelled)
        ));
        assert_eq!(stage.move_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stage_fault_is_terminal_for_the_wait() {
        let stage = Arc::new(MockRotationStage::new());
        stage.trip_fault();
        let motion = controller(stage, RetryPolicy::default(), CancelToken::new());
        assert!(matches!(
            motion.home_and_wait().await,
            Err(SweepError::StageFault)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn position_read_retries_query_failures() {
        let stage = Arc::new(MockRotationStage::new());
        stage.move_to(123.0).await.unwrap();
        stage.fail_next_position_queries(2);
        let motion = controller(stage, RetryPolicy::default(), CancelToken::new());
        assert_eq!(motion.read_position().await.unwrap(), 123.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unending_motion_hits_the_deadline() {
        let stage = Arc::new(MockRotationStage::with_settle_polls(u32::MAX));
        let policy = RetryPolicy {
            motion_deadline: Duration::from_secs(2),
            ..RetryPolicy::default()
        };
        let motion = controller(stage, policy, CancelToken::new());
        let err = motion.home_and_wait().await.unwrap_err();
        assert!(matches!(err, SweepError::MotionTimeout { .. }));
    }
}
