//! The measurement procedure: engine, motion layer, instrument bundle, and
//! run lifecycle types.

pub mod bench;
pub mod engine;
pub mod motion;
pub mod state;

pub use bench::{InstrumentBundle, LockinChannel};
pub use engine::ProcedureEngine;
pub use motion::{MotionController, RetryPolicy};
pub use state::{EngineState, RunResult, RunStatus, Sample};
