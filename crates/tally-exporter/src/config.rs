//! Exporter configuration loaded from a YAML file.

use std::{
    fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use serde::{de, Deserialize, Deserializer};
use tally::Format;

/// Error loading [`ExporterConfig`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed reading config file")]
    Read(#[source] io::Error),
    /// Failed to parse YAML, or the YAML doesn't match the expected shape.
    #[error("failed parsing YAML config")]
    Parse(#[from] serde_yaml::Error),
    /// Configuration is well-formed, but has invalid values.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Exposition format as specified in the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpositionFormat {
    /// Prometheus text format, version 0.0.4.
    #[default]
    Prometheus,
    /// OpenMetrics text format.
    OpenMetrics,
    /// OpenMetrics text format without `_total` counter suffixes.
    OpenMetricsForPrometheus,
}

impl From<ExpositionFormat> for Format {
    fn from(format: ExpositionFormat) -> Self {
        match format {
            ExpositionFormat::Prometheus => Self::Prometheus,
            ExpositionFormat::OpenMetrics => Self::OpenMetrics,
            ExpositionFormat::OpenMetricsForPrometheus => Self::OpenMetricsForPrometheus,
        }
    }
}

/// Exporter configuration.
///
/// Keys may be specified at the top level of the file or nested in a `conf` mapping.
/// Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExporterConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// IP address to bind to.
    #[serde(default = "ExporterConfig::default_bind_address")]
    pub bind_address: IpAddr,
    /// Path serving metrics. All other paths serve the index page.
    #[serde(default = "ExporterConfig::default_metrics_path")]
    pub metrics_path: String,
    /// Deadline for draining open connections on shutdown, e.g. `5s` or `500ms`.
    #[serde(
        default = "ExporterConfig::default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// Exposition format.
    #[serde(default)]
    pub format: ExpositionFormat,
}

impl ExporterConfig {
    const NESTED_KEY: &'static str = "conf";

    fn default_bind_address() -> IpAddr {
        Ipv4Addr::UNSPECIFIED.into()
    }

    fn default_metrics_path() -> String {
        "/metrics".to_owned()
    }

    const fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(5)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or has invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path.as_ref()).map_err(ConfigError::Read)?;
        Self::from_yaml(&raw)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or has invalid values.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
        let nested = if value.get("port").is_none() {
            value.get(Self::NESTED_KEY).cloned()
        } else {
            None
        };
        let config: Self = serde_yaml::from_value(nested.unwrap_or(value))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_owned()));
        }
        if !self.metrics_path.starts_with('/') || self.metrics_path == "/" {
            return Err(ConfigError::Invalid(format!(
                "metrics_path `{}` must start with `/` and differ from the index path `/`",
                self.metrics_path
            )));
        }
        Ok(())
    }

    /// Returns the socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(de::Error::custom)
}
