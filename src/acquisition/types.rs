//! Data types flowing through the acquisition pipeline.

use chrono::{DateTime, Utc};

/// One three-axis accelerometer reading as delivered by the printer.
///
/// `timestamp` is the printer's own clock in seconds, passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Printer-side timestamp (seconds)
    pub timestamp: f64,
    /// X acceleration
    pub x: f64,
    /// Y acceleration
    pub y: f64,
    /// Z acceleration
    pub z: f64,
}

impl SensorSample {
    /// Build a sample from its four fields.
    pub fn new(timestamp: f64, x: f64, y: f64, z: f64) -> Self {
        Self { timestamp, x, y, z }
    }
}

/// Heater and progress snapshot from one status poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSample {
    /// When the poll completed
    pub timestamp: DateTime<Utc>,
    /// Current bed temperature (°C)
    pub bed_temp: f64,
    /// Bed target (°C), 0 when the heater is off
    pub bed_target: f64,
    /// Current nozzle temperature (°C)
    pub nozzle_temp: f64,
    /// Nozzle target (°C), 0 when the heater is off
    pub nozzle_target: f64,
    /// Print progress in `[0, 1]`
    pub progress: f64,
}

impl StatusSample {
    /// Whether both heaters are switched on and have reached their targets.
    ///
    /// A zero target means the zone is off, which never counts as "reached".
    pub fn heaters_at_target(&self) -> bool {
        self.bed_target > 0.0
            && self.nozzle_target > 0.0
            && self.bed_temp >= self.bed_target
            && self.nozzle_temp >= self.nozzle_target
    }
}

/// One row of the status audit trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuditRecord {
    /// Status values for this cycle
    pub status: StatusSample,
    /// Readiness flag as observed after this cycle's evaluation
    pub printing: bool,
}

/// Summary statistics for one axis of the window.
///
/// Every field is NaN when the window held too few samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisFeatures {
    /// Root mean square
    pub rms: f64,
    /// Population standard deviation
    pub std: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Pearson (non-excess) kurtosis
    pub kurtosis: f64,
    /// Peak absolute value over RMS
    pub crest: f64,
}

impl AxisFeatures {
    /// All-NaN features for an axis without enough samples.
    pub const UNDEFINED: AxisFeatures = AxisFeatures {
        rms: f64::NAN,
        std: f64::NAN,
        mean: f64::NAN,
        kurtosis: f64::NAN,
        crest: f64::NAN,
    };

    /// Fields in output order: rms, std, mean, kurtosis, crest.
    pub fn as_array(&self) -> [f64; 5] {
        [self.rms, self.std, self.mean, self.kurtosis, self.crest]
    }
}

/// Rolling statistics computed from one window snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRecord {
    /// Wall-clock time of the computation
    pub timestamp: DateTime<Utc>,
    /// X axis statistics
    pub x: AxisFeatures,
    /// Y axis statistics
    pub y: AxisFeatures,
    /// Z axis statistics
    pub z: AxisFeatures,
}

impl FeatureRecord {
    /// The 15 numeric fields, axis-major (all of x, then y, then z).
    pub fn values(&self) -> [f64; 15] {
        let mut out = [0.0; 15];
        for (chunk, axis) in out.chunks_exact_mut(5).zip([&self.x, &self.y, &self.z]) {
            chunk.copy_from_slice(&axis.as_array());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(bed: f64, bed_target: f64, nozzle: f64, nozzle_target: f64) -> StatusSample {
        StatusSample {
            timestamp: Utc::now(),
            bed_temp: bed,
            bed_target,
            nozzle_temp: nozzle,
            nozzle_target,
            progress: 0.0,
        }
    }

    #[test]
    fn heaters_at_target_requires_both_zones() {
        assert!(status(60.0, 60.0, 215.0, 215.0).heaters_at_target());
        assert!(status(61.2, 60.0, 216.0, 215.0).heaters_at_target());
        assert!(!status(59.9, 60.0, 215.0, 215.0).heaters_at_target());
        assert!(!status(60.0, 60.0, 214.0, 215.0).heaters_at_target());
    }

    #[test]
    fn zero_target_never_counts_as_reached() {
        assert!(!status(25.0, 0.0, 215.0, 215.0).heaters_at_target());
        assert!(!status(60.0, 60.0, 25.0, 0.0).heaters_at_target());
        assert!(!status(25.0, 0.0, 25.0, 0.0).heaters_at_target());
    }

    #[test]
    fn feature_values_are_axis_major() {
        let axis = |base: f64| AxisFeatures {
            rms: base,
            std: base + 1.0,
            mean: base + 2.0,
            kurtosis: base + 3.0,
            crest: base + 4.0,
        };
        let record = FeatureRecord {
            timestamp: Utc::now(),
            x: axis(0.0),
            y: axis(10.0),
            z: axis(20.0),
        };
        assert_eq!(
            record.values(),
            [
                0.0, 1.0, 2.0, 3.0, 4.0, 10.0, 11.0, 12.0, 13.0, 14.0, 20.0, 21.0, 22.0, 23.0,
                24.0
            ]
        );
    }
}
