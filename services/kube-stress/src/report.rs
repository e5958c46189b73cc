//! Results reporting and formatting.

use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::config::ListConfig;
use crate::counters::Summary;

/// How the final report is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Summary log line only
    #[default]
    Log,
    /// Summary log line plus a table on stdout
    Table,
    /// Summary log line plus pretty JSON on stdout
    Json,
}

/// A finished run with the settings that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub namespace: String,
    pub object_type: String,
    pub page_size: u32,
    pub num_clients: usize,
    pub qps: f64,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub cancelled: bool,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub succeeded_requests: u64,
    /// `None` (JSON `null`) when no request was issued
    pub failure_rate_percent: Option<f64>,
}

impl RunReport {
    pub fn new(config: &ListConfig, summary: Summary, elapsed: Duration, cancelled: bool) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            namespace: config.namespace.clone(),
            object_type: config.object_type.clone(),
            page_size: config.page_size,
            num_clients: config.num_clients,
            qps: config.qps,
            total_duration: config.total_duration,
            elapsed,
            cancelled,
            total_requests: summary.total,
            failed_requests: summary.failed,
            succeeded_requests: summary.succeeded(),
            failure_rate_percent: summary.failure_rate(),
        }
    }
}

/// Formats run reports for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format a report as a console table.
    pub fn format_table(report: &RunReport) -> String {
        let namespace = if report.namespace.is_empty() {
            "(all namespaces)"
        } else {
            report.namespace.as_str()
        };
        let page_size = if report.page_size == 0 {
            "unpaginated".to_string()
        } else {
            report.page_size.to_string()
        };
        let failure_rate = match report.failure_rate_percent {
            Some(rate) => format!("{:.2}%", rate),
            None => "undefined".to_string(),
        };

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!(
                "List Load Results: {}/{}",
                namespace, report.object_type
            )]);

        table.add_row(vec!["Page Size:", &page_size]);
        table.add_row(vec!["Clients:", &report.num_clients.to_string()]);
        table.add_row(vec!["Target QPS:", &format!("{:.2}", report.qps)]);
        table.add_row(vec![
            "Duration:",
            &format!(
                "{} (ran {:.1}s{})",
                humantime::format_duration(report.total_duration),
                report.elapsed.as_secs_f64(),
                if report.cancelled { ", cancelled" } else { "" }
            ),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Total Requests:", &report.total_requests.to_string()]);
        table.add_row(vec!["Failed Requests:", &report.failed_requests.to_string()]);
        table.add_row(vec!["Failure Rate:", &failure_rate]);

        table.to_string()
    }

    /// Format a report as JSON.
    pub fn format_json(report: &RunReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(summary: Summary) -> RunReport {
        RunReport::new(
            &ListConfig::default(),
            summary,
            Duration::from_millis(300_500),
            false,
        )
    }

    #[test]
    fn test_table_contains_totals() {
        let table = ResultsReport::format_table(&report(Summary { total: 600, failed: 3 }));
        assert!(table.contains("kube-stress/configmaps"));
        assert!(table.contains("600"));
        assert!(table.contains("0.50%"));
        assert!(table.contains("5m (ran 300.5s)"));
    }

    #[test]
    fn test_table_with_no_requests() {
        let table = ResultsReport::format_table(&report(Summary::default()));
        assert!(table.contains("undefined"));
    }

    #[test]
    fn test_json_undefined_rate_is_null() {
        let json = ResultsReport::format_json(&report(Summary::default())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_requests"], 0);
        assert!(value["failure_rate_percent"].is_null());
        assert_eq!(value["total_duration"], "5m");
        assert_eq!(value["cancelled"], false);
    }

    #[test]
    fn test_json_rate() {
        let json = ResultsReport::format_json(&report(Summary { total: 4, failed: 1 })).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["failure_rate_percent"], 25.0);
        assert_eq!(value["succeeded_requests"], 3);
    }
}
