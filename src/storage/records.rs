//! CSV layouts for the three output streams.

use crate::acquisition::types::{AuditRecord, FeatureRecord, SensorSample};
use chrono::SecondsFormat;
use std::io::Write;

/// A record with a fixed CSV header and row encoding.
pub trait CsvRecord {
    /// Column names, written once when the file is opened.
    const HEADER: &'static [&'static str];

    /// Write this record as one CSV row.
    fn write_row<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()>;
}

impl CsvRecord for SensorSample {
    const HEADER: &'static [&'static str] = &["timestamp", "x", "y", "z"];

    fn write_row<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.write_record(&[
            self.timestamp.to_string(),
            self.x.to_string(),
            self.y.to_string(),
            self.z.to_string(),
        ])
    }
}

impl CsvRecord for FeatureRecord {
    const HEADER: &'static [&'static str] = &[
        "timestamp",
        "x_rms",
        "x_std",
        "x_mean",
        "x_kurt",
        "x_crest",
        "y_rms",
        "y_std",
        "y_mean",
        "y_kurt",
        "y_crest",
        "z_rms",
        "z_std",
        "z_mean",
        "z_kurt",
        "z_crest",
    ];

    fn write_row<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.write_field(
            self.timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        )?;
        for value in self.values() {
            writer.write_field(value.to_string())?;
        }
        writer.write_record(None::<&[u8]>)
    }
}

impl CsvRecord for AuditRecord {
    const HEADER: &'static [&'static str] = &[
        "timestamp",
        "bed_temp",
        "bed_target",
        "extruder_temp",
        "extruder_target",
        "progress",
        "printing_flag",
    ];

    fn write_row<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        let s = &self.status;
        writer.write_record(&[
            s.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            s.bed_temp.to_string(),
            s.bed_target.to_string(),
            s.nozzle_temp.to_string(),
            s.nozzle_target.to_string(),
            s.progress.to_string(),
            self.printing.to_string(),
        ])
    }
}
