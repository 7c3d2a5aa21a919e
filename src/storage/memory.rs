//! In-memory sink shared between a pipeline stage and an observer.

use crate::error::AppResult;
use crate::storage::RecordSink;
use parking_lot::Mutex;
use std::sync::Arc;

/// Collects records in a shared vector.
///
/// Clones share the same storage, so a test can hand one clone to the pipeline and
/// inspect the other.
#[derive(Debug)]
pub struct MemorySink<R> {
    records: Arc<Mutex<Vec<R>>>,
    flushes: Arc<Mutex<u64>>,
}

impl<R> Clone for MemorySink<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            flushes: Arc::clone(&self.flushes),
        }
    }
}

impl<R> Default for MemorySink<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> MemorySink<R> {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            flushes: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Number of flush calls observed.
    pub fn flush_count(&self) -> u64 {
        *self.flushes.lock()
    }
}

impl<R: Clone> MemorySink<R> {
    /// Copy of every record appended so far, in order.
    pub fn records(&self) -> Vec<R> {
        self.records.lock().clone()
    }
}

impl<R: Clone + Send> RecordSink<R> for MemorySink<R> {
    fn append(&mut self, record: &R) -> AppResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> AppResult<()> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_records() {
        let observer = MemorySink::<u32>::new();
        let mut writer = observer.clone();
        writer.append(&1).unwrap();
        writer.append(&2).unwrap();
        writer.flush().unwrap();

        assert_eq!(observer.records(), vec![1, 2]);
        assert_eq!(observer.flush_count(), 1);
        assert!(!observer.is_empty());
    }
}
