//! alertsync configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{FetchKind, FetchRequest};

/// Main alertsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Route prefixes that drive polling and one-shot batches
    pub routes: RoutesConfig,

    /// Poll task cadence and escalation
    pub poll: PollConfig,

    /// Backend connection
    pub server: ServerConfig,

    /// Result sink channel sizing
    pub sink: SinkConfig,

    /// Location bus sizing
    pub bus: BusConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_ms == 0 {
            return Err(eyre::eyre!("poll.interval-ms must be greater than zero"));
        }
        if self.poll.failure_threshold == 0 {
            return Err(eyre::eyre!("poll.failure-threshold must be at least 1"));
        }
        if let Err(e) = url::Url::parse(&self.server.base_url) {
            return Err(eyre::eyre!("server.base-url {:?} is not a valid URL: {}", self.server.base_url, e));
        }
        if self.routes.violations_prefix.is_empty() {
            return Err(eyre::eyre!("routes.violations-prefix must not be empty"));
        }
        for batch in &self.routes.batches {
            if batch.prefix.is_empty() {
                return Err(eyre::eyre!("routes.batches: prefix must not be empty"));
            }
            for kind in &batch.fetches {
                if FetchRequest::unparameterized(*kind).is_none() {
                    return Err(eyre::eyre!(
                        "routes.batches[{}]: {} needs inputs and cannot run in a batch",
                        batch.prefix,
                        kind
                    ));
                }
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .alertsync.yml
        let local_config = PathBuf::from(".alertsync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/alertsync/alertsync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("alertsync").join("alertsync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".alertsync.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("alertsync").join("alertsync.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Route prefixes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Locations under this prefix run the violations poll task
    #[serde(rename = "violations-prefix")]
    pub violations_prefix: String,

    /// Locations that fire a one-shot batch of fetches
    pub batches: Vec<BatchRoute>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            violations_prefix: "/main/violations".to_string(),
            batches: vec![BatchRoute {
                prefix: "/main/dashboard".to_string(),
                fetches: vec![
                    FetchKind::AlertCountsByPolicyCategories,
                    FetchKind::AlertCountsByCluster,
                    FetchKind::AlertsByTimeseries,
                ],
            }],
        }
    }
}

/// A route prefix and the fetches fired when a location enters it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRoute {
    pub prefix: String,
    pub fetches: Vec<FetchKind>,
}

impl BatchRoute {
    /// Requests for this batch; kinds that need inputs are skipped
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.fetches
            .iter()
            .filter_map(|k| FetchRequest::unparameterized(*k))
            .collect()
    }
}

/// Poll task cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Sleep between cycles in milliseconds
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Consecutive failed cycles before escalating to "server unreachable"
    #[serde(rename = "failure-threshold")]
    pub failure_threshold: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            failure_threshold: 2,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Environment variable holding a bearer token, if any
    #[serde(rename = "token-env", skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    pub endpoints: EndpointsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8443".to_string(),
            timeout_ms: 30_000,
            token_env: None,
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        self.token_env.as_ref().and_then(|var| std::env::var(var).ok())
    }
}

/// Endpoint paths, relative to the base URL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    #[serde(rename = "alert-nums-by-policy")]
    pub alert_nums_by_policy: String,

    /// Alert list; the selected policy is sent as a search query
    pub alerts: String,

    #[serde(rename = "alert-counts")]
    pub alert_counts: String,

    #[serde(rename = "alerts-timeseries")]
    pub alerts_timeseries: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            alert_nums_by_policy: "/v1/alerts/summary/groups".to_string(),
            alerts: "/v1/alerts".to_string(),
            alert_counts: "/v1/alerts/summary/counts".to_string(),
            alerts_timeseries: "/v1/alerts/summary/timeseries".to_string(),
        }
    }
}

/// Result sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Notification channel capacity
    #[serde(rename = "channel-buffer")]
    pub channel_buffer: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { channel_buffer: 256 }
    }
}

/// Location bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Broadcast capacity; slow watchers that fall further behind skip events
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: crate::events::DEFAULT_BUS_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.routes.violations_prefix, "/main/violations");
        assert_eq!(config.routes.batches.len(), 1);
        assert_eq!(config.routes.batches[0].prefix, "/main/dashboard");
        assert_eq!(config.routes.batches[0].requests().len(), 3);
        assert_eq!(config.poll.interval(), Duration::from_millis(5000));
        assert_eq!(config.poll.failure_threshold, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
routes:
  violations-prefix: /main/alerts
  batches:
    - prefix: /main/overview
      fetches: [alert-counts-by-cluster]

poll:
  interval-ms: 1000
  failure-threshold: 3

server:
  base-url: https://central.example.com
  timeout-ms: 5000
  token-env: CENTRAL_TOKEN

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.routes.violations_prefix, "/main/alerts");
        assert_eq!(config.routes.batches[0].fetches, vec![FetchKind::AlertCountsByCluster]);
        assert_eq!(config.poll.interval_ms, 1000);
        assert_eq!(config.poll.failure_threshold, 3);
        assert_eq!(config.server.base_url, "https://central.example.com");
        assert_eq!(config.server.token_env.as_deref(), Some("CENTRAL_TOKEN"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        // Untouched sections keep defaults
        assert_eq!(config.server.endpoints.alerts, "/v1/alerts");
        assert_eq!(config.sink.channel_buffer, 256);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
poll:
  interval-ms: 250
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.poll.interval_ms, 250);
        assert_eq!(config.poll.failure_threshold, 2);
        assert_eq!(config.routes.violations_prefix, "/main/violations");
    }

    #[test]
    fn test_validate_rejects_parameterized_batch() {
        let mut config = Config::default();
        config.routes.batches[0].fetches.push(FetchKind::AlertsByPolicy);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("alerts-by-policy"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.poll.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.server.base_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.base-url"));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll:\n  interval-ms: 42\nlog-level: warn").unwrap();
        let path = file.path().to_path_buf();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.poll.interval_ms, 42);
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/alertsync.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert_eq!(Config::load_log_level(Some(&path)), None);
    }
}
