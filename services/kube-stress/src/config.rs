//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stress_common::{ListParams, StressError, StressResult};

/// Settings for a `list` run, loaded from a scenario file and/or CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Namespace to list from (empty value means all namespaces)
    pub namespace: String,
    /// Resource to list, e.g. `configmaps` or `pods`
    pub object_type: String,
    /// `limit` param of each list call (0 means no pagination)
    pub page_size: u32,
    /// Number of clients to spread the list calls over
    pub num_clients: usize,
    /// List calls launched per second
    pub qps: f64,
    /// How long to keep launching list calls
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    /// Deadline of a single list call, including reading the response
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// CSV file receiving one latency value per successful call
    pub csv_output_filepath: Option<PathBuf>,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            namespace: "kube-stress".to_string(),
            object_type: "configmaps".to_string(),
            page_size: 0,
            num_clients: 10,
            qps: 2.0,
            total_duration: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(60),
            csv_output_filepath: None,
        }
    }
}

impl ListConfig {
    /// Load configuration from a YAML scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> StressResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| {
            StressError::invalid("scenario", format!("{}: {}", path.display(), e))
        })
    }

    /// Validate configuration.
    pub fn validate(&self) -> StressResult<()> {
        if self.num_clients == 0 {
            return Err(StressError::invalid("num_clients", "must be >= 1"));
        }
        if self.object_type.trim().is_empty() {
            return Err(StressError::invalid("object_type", "must not be empty"));
        }
        // The remaining checks live with the dispatch config itself.
        self.dispatch_config().map(|_| ())
    }

    pub fn list_params(&self) -> ListParams {
        ListParams {
            namespace: self.namespace.clone(),
            object_type: self.object_type.clone(),
            page_size: self.page_size,
        }
    }

    pub fn dispatch_config(&self) -> StressResult<DispatchConfig> {
        DispatchConfig::new(
            self.qps,
            self.total_duration,
            self.request_timeout,
            self.list_params(),
        )
    }
}

/// Validated, immutable input of a dispatcher run.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    qps: f64,
    tick_interval: Duration,
    total_duration: Duration,
    request_timeout: Duration,
    params: ListParams,
}

impl DispatchConfig {
    /// Build a config, rejecting any rate that does not yield a usable tick
    /// interval.
    pub fn new(
        qps: f64,
        total_duration: Duration,
        request_timeout: Duration,
        params: ListParams,
    ) -> StressResult<Self> {
        if !qps.is_finite() || qps <= 0.0 {
            return Err(StressError::invalid(
                "qps",
                format!("must be a finite number > 0, got {}", qps),
            ));
        }
        let tick_interval = Duration::try_from_secs_f64(1.0 / qps)
            .map_err(|e| StressError::invalid("qps", format!("{} is too small: {}", qps, e)))?;
        if tick_interval.is_zero() {
            return Err(StressError::invalid(
                "qps",
                format!("{} is too large for a nanosecond ticker", qps),
            ));
        }
        if request_timeout.is_zero() {
            return Err(StressError::invalid("request_timeout", "must be > 0"));
        }

        Ok(Self {
            qps,
            tick_interval,
            total_duration,
            request_timeout,
            params,
        })
    }

    pub fn qps(&self) -> f64 {
        self.qps
    }

    /// Time between two launched requests, `1 / qps`.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn params(&self) -> &ListParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{temp_dir, write_fixture};

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = ListConfig::default();
        assert_eq!(config.namespace, "kube-stress");
        assert_eq!(config.object_type, "configmaps");
        assert_eq!(config.page_size, 0);
        assert_eq!(config.num_clients, 10);
        assert_eq!(config.qps, 2.0);
        assert_eq!(config.total_duration, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tick_interval_is_fractional() {
        let config = ListConfig {
            qps: 3.0,
            ..Default::default()
        };
        let dispatch = config.dispatch_config().unwrap();
        assert_eq!(dispatch.tick_interval(), Duration::from_nanos(333_333_333));

        let config = ListConfig {
            qps: 0.5,
            ..Default::default()
        };
        assert_eq!(
            config.dispatch_config().unwrap().tick_interval(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_zero_qps_is_a_config_error() {
        let config = ListConfig {
            qps: 0.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("qps"));
    }

    #[test]
    fn test_non_finite_and_extreme_qps_rejected() {
        for qps in [-1.0, f64::NAN, f64::INFINITY, 1e-30, 1e12] {
            let config = ListConfig {
                qps,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "qps {} should be rejected", qps);
        }
    }

    #[test]
    fn test_zero_clients_rejected() {
        let config = ListConfig {
            num_clients: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_duration_is_allowed() {
        let config = ListConfig {
            total_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_with_humantime_durations() {
        let dir = temp_dir();
        let path = write_fixture(
            dir.path(),
            "scenario.yaml",
            r#"
namespace: ""
object_type: pods
page_size: 500
qps: 20.5
total_duration: 90s
request_timeout: 1m 30s
csv_output_filepath: /tmp/latencies.csv
"#,
        );

        let config = ListConfig::from_file(&path).unwrap();
        assert_eq!(config.namespace, "");
        assert_eq!(config.object_type, "pods");
        assert_eq!(config.page_size, 500);
        assert_eq!(config.num_clients, 10);
        assert_eq!(config.qps, 20.5);
        assert_eq!(config.total_duration, Duration::from_secs(90));
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(
            config.csv_output_filepath,
            Some(PathBuf::from("/tmp/latencies.csv"))
        );
    }

    #[test]
    fn test_from_file_rejects_bad_duration() {
        let dir = temp_dir();
        let path = write_fixture(dir.path(), "bad.yaml", "total_duration: forever\n");
        let err = ListConfig::from_file(&path).unwrap_err();
        assert!(err.is_config_error());
    }
}
