//! Custom error types for the measurement engine.
//!
//! Two layers of failure exist in this system:
//!
//! - [`TransientIoError`]: an instrument query or write produced a malformed
//!   or timed-out response on the shared bus. The motion layer absorbs these
//!   by retrying; everywhere else they are fatal to the current run.
//! - [`SweepError`]: everything that can reject a configuration or terminate
//!   a run. A run that hits one of these still executes its shutdown step
//!   before reporting a terminal status.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type SweepResult<T> = std::result::Result<T, SweepError>;

/// A transient instrument I/O failure.
///
/// Raised by hardware capability methods when a response is malformed or the
/// instrument times out. Whether this is recoverable depends on the caller:
/// the rotation-stage retry loops recover it, lock-in reads do not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("instrument I/O error: {0}")]
pub struct TransientIoError(pub String);

impl TransientIoError {
    /// Build from anything printable (driver parse errors, timeouts).
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that reject a configuration or terminate a run.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A sweep parameter is out of range. Surfaced before any hardware is
    /// touched.
    #[error("invalid sweep range: {0}")]
    InvalidRange(String),

    /// A hardware handle could not be brought to a usable state during
    /// startup. Fatal: the run ends Faulted.
    #[error("failed to acquire {device}: {source}")]
    Acquisition {
        /// Human-readable device name.
        device: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<SweepError>,
    },

    /// A lock-in read failed mid-sweep. Fatal to the current run; samples
    /// gathered so far are preserved.
    #[error("lock-in {channel} read failed: {source}")]
    Read {
        /// Which amplifier failed (1 or 2).
        channel: u8,
        /// The underlying I/O failure.
        #[source]
        source: TransientIoError,
    },

    /// A current-source or lock-in configuration command failed.
    #[error("instrument command failed on {device}: {source}")]
    Command {
        /// Human-readable device name.
        device: &'static str,
        /// The underlying I/O failure.
        #[source]
        source: TransientIoError,
    },

    /// The bounded retry loop gave up on a rotation-stage operation.
    #[error("{operation} gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// The operation that was being retried.
        operation: &'static str,
        /// Attempts made before giving up.
        attempts: u32,
        /// The last transient failure observed.
        #[source]
        source: TransientIoError,
    },

    /// Motion did not complete within the wall-clock deadline.
    #[error("motion did not settle within {waited_secs:.1}s")]
    MotionTimeout {
        /// How long the controller waited before giving up.
        waited_secs: f64,
    },

    /// The rotation stage reported a hard fault while settling.
    #[error("rotation stage reported a fault")]
    StageFault,

    /// The externally-settable cancellation flag was observed.
    #[error("run cancelled")]
    Cancelled,

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Result-sink I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Result-sink CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SweepError {
    /// True if this error represents an external cancellation rather than a
    /// fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SweepError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_error_displays_message() {
        let err = TransientIoError::new("query timed out");
        assert_eq!(err.to_string(), "instrument I/O error: query timed out");
    }

    #[test]
    fn acquisition_error_carries_source() {
        let err = SweepError::Acquisition {
            device: "rotation stage",
            source: Box::new(SweepError::RetriesExhausted {
                operation: "home",
                attempts: 50,
                source: TransientIoError::new("garbled response"),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("rotation stage"));
        assert!(text.contains("50 attempts"));
    }

    #[test]
    fn cancelled_is_not_a_fault() {
        assert!(SweepError::Cancelled.is_cancelled());
        assert!(!SweepError::StageFault.is_cancelled());
    }
}
