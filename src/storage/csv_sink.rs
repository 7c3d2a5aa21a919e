//! CSV file sink.
use crate::error::{AppResult, DaqError};
use crate::storage::records::CsvRecord;
use crate::storage::RecordSink;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A writer for CSV files.
///
/// The file is created (truncating any previous content) and the header written as
/// soon as the sink is opened, so a missing output directory or unwritable path is
/// reported at session start rather than at the first record.
pub struct CsvSink<R> {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
    _record: PhantomData<fn(&R)>,
}

impl<R: CsvRecord> CsvSink<R> {
    /// Create the file at `path` and write the header row.
    pub fn create(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DaqError::Storage(format!(
                    "Failed to create output directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = File::create(&path).map_err(|e| {
            DaqError::Storage(format!(
                "Failed to create CSV file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(R::HEADER)?;
        writer.flush()?;

        tracing::info!(path = %path.display(), "CSV sink opened");

        Ok(Self {
            path,
            writer,
            rows: 0,
            _record: PhantomData,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows appended so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl<R: CsvRecord> RecordSink<R> for CsvSink<R> {
    fn append(&mut self, record: &R) -> AppResult<()> {
        record.write_row(&mut self.writer)?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> AppResult<()> {
        self.writer.flush().map_err(|e| {
            DaqError::Storage(format!("Failed to flush '{}': {}", self.path.display(), e))
        })
    }
}
