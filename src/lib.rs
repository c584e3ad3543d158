//! # hallsweep
//!
//! Control core for an angle-resolved second-harmonic measurement: a magnet
//! holds a target field while the sample rotates through a planned angle
//! sequence and two lock-in amplifiers record in-phase/quadrature voltages
//! at every angle, for one or more field magnitudes.
//!
//! The crate is the measurement-procedure control loop: the sequencing,
//! retry, and synchronization logic that drives a rotation stage, current
//! source, and lock-in amplifiers through the protocol despite unreliable
//! instrument I/O. Concrete drivers, plotting, and result-file management
//! live elsewhere and plug in through the capability traits and the
//! observer interface.
//!
//! ## Module structure
//!
//! - **`config`**: immutable [`config::MeasurementConfig`] with declared
//!   defaults, validated once before hardware is touched.
//! - **`calibration`**: field-to-current polynomial, coefficients validated
//!   at construction.
//! - **`sweep`**: pure planning of angle and (optionally reciprocal-spaced)
//!   field sequences.
//! - **`hardware`**: the capability traits drivers implement
//!   (`RotationStage`, `CurrentSource`, `LockinAmplifier`) plus scripted
//!   mocks for testing.
//! - **`procedure`**: the engine state machine, the bounded-retry motion
//!   layer, and the instrument bundle.
//! - **`queue`**: strictly sequential execution of one engine per planned
//!   field value.
//! - **`sink`**: the injected observer that receives samples and progress
//!   (in-memory and CSV implementations included).
//! - **`cancel`**: the externally-settable cancellation flag polled at the
//!   engine's suspension points.
//! - **`error`**: the crate-wide error taxonomy.

pub mod calibration;
pub mod cancel;
pub mod config;
pub mod error;
pub mod hardware;
pub mod procedure;
pub mod queue;
pub mod sink;
pub mod sweep;

pub use calibration::FieldCalibration;
pub use cancel::CancelToken;
pub use config::MeasurementConfig;
pub use error::{SweepError, SweepResult, TransientIoError};
pub use procedure::{
    EngineState, InstrumentBundle, MotionController, ProcedureEngine, RetryPolicy, RunResult,
    RunStatus, Sample,
};
pub use queue::RunQueue;
pub use sink::{CsvSink, MemorySink, RunObserver};
pub use sweep::SweepPlan;
