//! CSV output of per-request latencies.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use stress_common::{ResultSink, StressError, StressResult};
use tracing::info;

/// Thread-safe CSV writer with one single-column record per latency.
///
/// Records are buffered; call [`ResultSink::flush`] once the run is over.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvSink {
    /// Create (or truncate) the CSV file at `path`.
    pub fn create(path: impl AsRef<Path>) -> StressResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|e| StressError::Sink(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Writing latencies to CSV");

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvSink {
    fn record(&self, value: &str) -> StressResult<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StressError::Sink("CSV writer lock poisoned".to_string()))?;
        writer
            .write_record([value])
            .map_err(|e| StressError::Sink(e.to_string()))
    }

    fn flush(&self) -> StressResult<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StressError::Sink("CSV writer lock poisoned".to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use test_utils::temp_dir;

    #[test]
    fn test_records_one_value_per_line() {
        let dir = temp_dir();
        let sink = CsvSink::create(dir.path().join("latency.csv")).unwrap();

        sink.record("12.5ms").unwrap();
        sink.record("1.002s").unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content, "12.5ms\n1.002s\n");
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = temp_dir();
        let path = dir.path().join("results").join("run1").join("latency.csv");
        let sink = CsvSink::create(&path).unwrap();
        sink.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_concurrent_records_stay_intact() {
        let dir = temp_dir();
        let sink = Arc::new(CsvSink::create(dir.path().join("latency.csv")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        sink.record(&format!("{}.{:03}ms", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        sink.flush().unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2000);
        for line in lines {
            let (whole, frac) = line
                .strip_suffix("ms")
                .and_then(|v| v.split_once('.'))
                .unwrap_or_else(|| panic!("corrupt record: {:?}", line));
            assert!(whole.parse::<u32>().unwrap() < 8);
            assert_eq!(frac.len(), 3);
        }
    }
}
