//! In-memory result sinks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use stress_common::{ResultSink, StressError, StressResult};

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<String> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ResultSink for RecordingSink {
    fn record(&self, value: &str) -> StressResult<()> {
        self.records
            .lock()
            .map_err(|_| StressError::Sink("poisoned".to_string()))?
            .push(value.to_string());
        Ok(())
    }

    fn flush(&self) -> StressResult<()> {
        Ok(())
    }
}

/// Rejects every write.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ResultSink for FailingSink {
    fn record(&self, _value: &str) -> StressResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StressError::Sink("disk full".to_string()))
    }

    fn flush(&self) -> StressResult<()> {
        Err(StressError::Sink("disk full".to_string()))
    }
}
