//! Destination for per-request latency records.

use crate::error::StressResult;

/// Appends one record per completed request.
///
/// Implementations serialize their own writes: `record` is called from many
/// worker tasks at once and each call must land as one intact record.
pub trait ResultSink: Send + Sync {
    fn record(&self, value: &str) -> StressResult<()>;

    /// Called once after every worker has finished.
    fn flush(&self) -> StressResult<()>;
}
