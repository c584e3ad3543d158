//! Result sinks.
//!
//! The engine does not own a logger or a results file; it is handed a
//! [`RunObserver`] whose lifetime is scoped to the run. Samples and progress
//! updates are delivered strictly in chronological order, at most once each.
//!
//! Two implementations ship with the crate: [`MemorySink`] for tests and
//! [`CsvSink`] for the CLI. File naming/uniqueness policy is the caller's
//! concern; the CSV sink appends to whatever path it was given.

use crate::error::SweepResult;
use crate::procedure::Sample;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Column headers of the sample record, in emission order.
pub const SAMPLE_COLUMNS: [&str; 7] = [
    "Angle (deg)",
    "Current (A)",
    "Magnetic Field (T)",
    "1X Voltage (V)",
    "1Y Voltage (V)",
    "2X Voltage (V)",
    "2Y Voltage (V)",
];

/// Observer injected into the engine for sample and progress delivery.
///
/// Implementations must not block for long: they are called from the
/// measurement loop between instrument operations.
pub trait RunObserver: Send + Sync {
    /// One measured sample, delivered immediately after acquisition.
    fn on_sample(&self, sample: &Sample);

    /// Sweep progress in percent, emitted once per angle.
    fn on_progress(&self, percent: f64);
}

/// In-memory sink collecting everything it is handed. Testing aid.
#[derive(Debug, Default)]
pub struct MemorySink {
    samples: Mutex<Vec<Sample>>,
    progress: Mutex<Vec<f64>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples received so far, in delivery order.
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Progress values received so far, in delivery order.
    pub fn progress(&self) -> Vec<f64> {
        self.progress.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl RunObserver for MemorySink {
    fn on_sample(&self, sample: &Sample) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.push(sample.clone());
        }
    }

    fn on_progress(&self, percent: f64) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.push(percent);
        }
    }
}

/// CSV sink: one header row, then one record per sample.
pub struct CsvSink {
    writer: Mutex<csv::Writer<File>>,
}

impl CsvSink {
    /// Create (or truncate) `path` and write the header row.
    pub fn create(path: &Path) -> SweepResult<Self> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        writer.write_record(SAMPLE_COLUMNS)?;
        writer.flush()?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

impl RunObserver for CsvSink {
    fn on_sample(&self, sample: &Sample) {
        let record = [
            sample.angle_deg.to_string(),
            sample.current_amps.to_string(),
            sample.field_tesla.to_string(),
            sample.x1_volts.to_string(),
            sample.y1_volts.to_string(),
            sample.x2_volts.to_string(),
            sample.y2_volts.to_string(),
        ];
        // The observer interface is infallible; a dead results file must not
        // abort an otherwise healthy run.
        match self.writer.lock() {
            Ok(mut writer) => {
                if let Err(err) = writer.write_record(record).and_then(|()| writer.flush().map_err(Into::into)) {
                    warn!(%err, "failed to append sample to CSV");
                }
            }
            Err(_) => warn!("CSV writer lock poisoned; sample dropped"),
        }
    }

    fn on_progress(&self, _percent: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(angle: f64) -> Sample {
        Sample {
            angle_deg: angle,
            current_amps: 0.01,
            field_tesla: 0.1,
            x1_volts: 1.0,
            y1_volts: 2.0,
            x2_volts: 3.0,
            y2_volts: 4.0,
        }
    }

    #[test]
    fn memory_sink_preserves_delivery_order() {
        let sink = MemorySink::new();
        sink.on_sample(&sample(0.0));
        sink.on_sample(&sample(1.0));
        sink.on_progress(50.0);
        sink.on_progress(100.0);

        let samples = sink.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].angle_deg, 0.0);
        assert_eq!(samples[1].angle_deg, 1.0);
        assert_eq!(sink.progress(), vec![50.0, 100.0]);
    }

    #[test]
    fn csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        let sink = CsvSink::create(&path).unwrap();
        sink.on_sample(&sample(0.0));
        sink.on_sample(&sample(1.0));
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Angle (deg),Current (A),Magnetic Field (T)"));
        assert!(lines[1].starts_with("0,0.01,0.1,1,2,3,4"));
        assert!(lines[2].starts_with("1,"));
    }
}
