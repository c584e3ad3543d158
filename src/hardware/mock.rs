//! Mock hardware implementations.
//!
//! Simulated drivers for testing the procedure engine without physical
//! hardware. Faults are scripted: each mock can be told to fail the next N
//! calls of an operation with a [`TransientIoError`], which is how the retry
//! and escalation paths are exercised deterministically.
//!
//! All state lives behind `tokio::sync::RwLock` or atomics; nothing blocks.

use crate::error::TransientIoError;
use crate::hardware::capabilities::{
    CurrentSource, HwResult, LockinAmplifier, MotionState, RotationStage,
};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

fn take_failure(counter: &AtomicU32, what: &str) -> HwResult<()> {
    // Decrement-if-positive; races don't matter for test scripting.
    if counter.load(Ordering::SeqCst) > 0 {
        counter.fetch_sub(1, Ordering::SeqCst);
        return Err(TransientIoError::new(format!("simulated {what} failure")));
    }
    Ok(())
}

// =============================================================================
// MockRotationStage
// =============================================================================

#[derive(Debug)]
struct StageInner {
    position_deg: f64,
    polls_until_rest: u32,
}

/// Simulated rotation stage.
///
/// After every accepted `home`/`move_to` the stage reports
/// [`MotionState::Moving`] for a configurable number of polls before coming
/// to rest at the commanded angle.
pub struct MockRotationStage {
    inner: RwLock<StageInner>,
    settle_polls: u32,
    home_failures: AtomicU32,
    move_failures: AtomicU32,
    state_failures: AtomicU32,
    position_failures: AtomicU32,
    hard_fault: AtomicBool,
    home_attempts: AtomicU32,
    move_attempts: AtomicU32,
}

impl MockRotationStage {
    /// Stage that settles immediately (zero Moving polls).
    pub fn new() -> Self {
        Self::with_settle_polls(0)
    }

    /// Stage that reports Moving for `settle_polls` polls after each command.
    pub fn with_settle_polls(settle_polls: u32) -> Self {
        Self {
            inner: RwLock::new(StageInner {
                position_deg: 0.0,
                polls_until_rest: 0,
            }),
            settle_polls,
            home_failures: AtomicU32::new(0),
            move_failures: AtomicU32::new(0),
            state_failures: AtomicU32::new(0),
            position_failures: AtomicU32::new(0),
            hard_fault: AtomicBool::new(false),
            home_attempts: AtomicU32::new(0),
            move_attempts: AtomicU32::new(0),
        }
    }

    /// Fail the next `count` `home` commands.
    pub fn fail_next_homes(&self, count: u32) {
        self.home_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` `move_to` commands.
    pub fn fail_next_moves(&self, count: u32) {
        self.move_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` `motion_state` polls.
    pub fn fail_next_state_polls(&self, count: u32) {
        self.state_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` `position` queries.
    pub fn fail_next_position_queries(&self, count: u32) {
        self.position_failures.store(count, Ordering::SeqCst);
    }

    /// Latch a hard fault: every subsequent state poll reports Fault.
    pub fn trip_fault(&self) {
        self.hard_fault.store(true, Ordering::SeqCst);
    }

    /// Total `home` commands issued (including failed ones).
    pub fn home_attempts(&self) -> u32 {
        self.home_attempts.load(Ordering::SeqCst)
    }

    /// Total `move_to` commands issued (including failed ones).
    pub fn move_attempts(&self) -> u32 {
        self.move_attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockRotationStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RotationStage for MockRotationStage {
    async fn home(&self) -> HwResult<()> {
        self.home_attempts.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.home_failures, "home")?;
        let mut inner = self.inner.write().await;
        inner.position_deg = 0.0;
        inner.polls_until_rest = self.settle_polls;
        debug!("MockRotationStage: homing");
        Ok(())
    }

    async fn move_to(&self, angle_deg: f64) -> HwResult<()> {
        self.move_attempts.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.move_failures, "move")?;
        let mut inner = self.inner.write().await;
        inner.position_deg = angle_deg;
        inner.polls_until_rest = self.settle_polls;
        debug!(angle_deg, "MockRotationStage: moving");
        Ok(())
    }

    async fn position(&self) -> HwResult<f64> {
        take_failure(&self.position_failures, "position query")?;
        Ok(self.inner.read().await.position_deg)
    }

    async fn motion_state(&self) -> HwResult<MotionState> {
        take_failure(&self.state_failures, "state poll")?;
        if self.hard_fault.load(Ordering::SeqCst) {
            return Ok(MotionState::Fault);
        }
        let mut inner = self.inner.write().await;
        if inner.polls_until_rest > 0 {
            inner.polls_until_rest -= 1;
            Ok(MotionState::Moving)
        } else {
            Ok(MotionState::AtRest)
        }
    }
}

// =============================================================================
// MockCurrentSource
// =============================================================================

/// Simulated magnet current source that records every ramp command.
pub struct MockCurrentSource {
    ramps: RwLock<Vec<(f64, Option<f64>)>>,
    ramp_failures: AtomicU32,
}

impl MockCurrentSource {
    /// Source with no scripted failures.
    pub fn new() -> Self {
        Self {
            ramps: RwLock::new(Vec::new()),
            ramp_failures: AtomicU32::new(0),
        }
    }

    /// Fail the next `count` ramp commands.
    pub fn fail_next_ramps(&self, count: u32) {
        self.ramp_failures.store(count, Ordering::SeqCst);
    }

    /// Every `(target, rate)` ramp accepted so far, in order.
    pub async fn ramps(&self) -> Vec<(f64, Option<f64>)> {
        self.ramps.read().await.clone()
    }
}

impl Default for MockCurrentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CurrentSource for MockCurrentSource {
    async fn ramp_to_current(
        &self,
        target_amps: f64,
        rate_amps_per_sec: Option<f64>,
    ) -> HwResult<()> {
        take_failure(&self.ramp_failures, "ramp")?;
        debug!(target_amps, ?rate_amps_per_sec, "MockCurrentSource: ramp");
        self.ramps.write().await.push((target_amps, rate_amps_per_sec));
        Ok(())
    }
}

// =============================================================================
// MockLockin
// =============================================================================

#[derive(Debug, Default)]
struct LockinInner {
    x_volts: f64,
    y_volts: f64,
    amplitude_volts: Option<f64>,
    frequency_hertz: Option<f64>,
}

/// Simulated lock-in amplifier with settable readings.
pub struct MockLockin {
    inner: RwLock<LockinInner>,
    noise_volts: f64,
    read_x_calls: AtomicU32,
    fail_read_x_on_call: AtomicU32,
}

impl MockLockin {
    /// Lock-in returning fixed `(x, y)` readings.
    pub fn with_reading(x_volts: f64, y_volts: f64) -> Self {
        Self {
            inner: RwLock::new(LockinInner {
                x_volts,
                y_volts,
                ..LockinInner::default()
            }),
            noise_volts: 0.0,
            read_x_calls: AtomicU32::new(0),
            fail_read_x_on_call: AtomicU32::new(0),
        }
    }

    /// Lock-in whose readings jitter by up to `noise_volts` around the base.
    pub fn noisy(x_volts: f64, y_volts: f64, noise_volts: f64) -> Self {
        Self {
            noise_volts,
            ..Self::with_reading(x_volts, y_volts)
        }
    }

    /// Fail the `call`-th X read (1-based). Zero disables.
    pub fn fail_read_x_on_call(&self, call: u32) {
        self.fail_read_x_on_call.store(call, Ordering::SeqCst);
    }

    /// Last amplitude written via `set_amplitude`, if any.
    pub async fn amplitude(&self) -> Option<f64> {
        self.inner.read().await.amplitude_volts
    }

    /// Last frequency written via `set_frequency`, if any.
    pub async fn frequency(&self) -> Option<f64> {
        self.inner.read().await.frequency_hertz
    }

    fn jitter(&self) -> f64 {
        if self.noise_volts > 0.0 {
            rand::thread_rng().gen_range(-self.noise_volts..self.noise_volts)
        } else {
            0.0
        }
    }
}

impl Default for MockLockin {
    fn default() -> Self {
        Self::with_reading(0.0, 0.0)
    }
}

#[async_trait]
impl LockinAmplifier for MockLockin {
    async fn set_amplitude(&self, volts: f64) -> HwResult<()> {
        self.inner.write().await.amplitude_volts = Some(volts);
        Ok(())
    }

    async fn set_frequency(&self, hertz: f64) -> HwResult<()> {
        self.inner.write().await.frequency_hertz = Some(hertz);
        Ok(())
    }

    async fn read_x(&self) -> HwResult<f64> {
        let call = self.read_x_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_read_x_on_call.load(Ordering::SeqCst) {
            return Err(TransientIoError::new("simulated lock-in read failure"));
        }
        Ok(self.inner.read().await.x_volts + self.jitter())
    }

    async fn read_y(&self) -> HwResult<f64> {
        Ok(self.inner.read().await.y_volts + self.jitter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_settles_after_configured_polls() {
        let stage = MockRotationStage::with_settle_polls(2);
        stage.move_to(45.0).await.unwrap();
        assert_eq!(stage.motion_state().await.unwrap(), MotionState::Moving);
        assert_eq!(stage.motion_state().await.unwrap(), MotionState::Moving);
        assert_eq!(stage.motion_state().await.unwrap(), MotionState::AtRest);
        assert_eq!(stage.position().await.unwrap(), 45.0);
    }

    #[tokio::test]
    async fn scripted_move_failures_then_success() {
        let stage = MockRotationStage::new();
        stage.fail_next_moves(2);
        assert!(stage.move_to(10.0).await.is_err());
        assert!(stage.move_to(10.0).await.is_err());
        assert!(stage.move_to(10.0).await.is_ok());
        assert_eq!(stage.move_attempts(), 3);
    }

    #[tokio::test]
    async fn tripped_fault_is_latched() {
        let stage = MockRotationStage::new();
        stage.trip_fault();
        assert_eq!(stage.motion_state().await.unwrap(), MotionState::Fault);
        assert_eq!(stage.motion_state().await.unwrap(), MotionState::Fault);
    }

    #[tokio::test]
    async fn source_records_ramps_in_order() {
        let source = MockCurrentSource::new();
        source.ramp_to_current(0.5, Some(5.0)).await.unwrap();
        source.ramp_to_current(0.5, None).await.unwrap();
        assert_eq!(source.ramps().await, vec![(0.5, Some(5.0)), (0.5, None)]);
    }

    #[tokio::test]
    async fn lockin_fails_the_scripted_read() {
        let lockin = MockLockin::with_reading(1.0, -1.0);
        lockin.fail_read_x_on_call(2);
        assert_eq!(lockin.read_x().await.unwrap(), 1.0);
        assert!(lockin.read_x().await.is_err());
        assert_eq!(lockin.read_x().await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn lockin_records_excitation_settings() {
        let lockin = MockLockin::default();
        lockin.set_amplitude(1.0).await.unwrap();
        lockin.set_frequency(1337.7).await.unwrap();
        assert_eq!(lockin.amplitude().await, Some(1.0));
        assert_eq!(lockin.frequency().await, Some(1337.7));
    }

    #[tokio::test]
    async fn noisy_lockin_stays_near_base() {
        let lockin = MockLockin::noisy(2.0, 0.0, 0.01);
        let x = lockin.read_x().await.unwrap();
        assert!((x - 2.0).abs() < 0.01);
    }
}
