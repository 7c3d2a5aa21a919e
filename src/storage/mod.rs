//! Append-only output sinks for raw samples, rolling features and the status audit.
//!
//! Every output stream is a [`RecordSink`]. The production sink is [`CsvSink`], which
//! writes a header once when opened and one row per appended record. [`MemorySink`]
//! keeps records in memory and is what the tests observe.

pub mod csv_sink;
pub mod memory;
pub mod records;

pub use csv_sink::CsvSink;
pub use memory::MemorySink;
pub use records::CsvRecord;

use crate::error::AppResult;

/// Append-only destination for records of type `R`.
pub trait RecordSink<R>: Send {
    /// Append one record.
    fn append(&mut self, record: &R) -> AppResult<()>;

    /// Push buffered records to the underlying medium.
    fn flush(&mut self) -> AppResult<()>;
}

/// Boxed sink used where the concrete backend is chosen at runtime.
pub type BoxedSink<R> = Box<dyn RecordSink<R>>;

impl<R, S> RecordSink<R> for Box<S>
where
    S: RecordSink<R> + ?Sized,
{
    fn append(&mut self, record: &R) -> AppResult<()> {
        (**self).append(record)
    }

    fn flush(&mut self) -> AppResult<()> {
        (**self).flush()
    }
}
