//! Configuration management.
//!
//! Settings are loaded from `config/<name>.toml` (or an explicit path) and
//! deserialized into typed sections. Durations are written in human form
//! ("250ms", "5s"). Semantic validation runs after deserialization so a
//! file that parses but carries a zero timeout is still rejected.

use std::path::Path;
use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::error::{RgaError, RgaResult};

/// Top-level driver settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Connection parameters for the instrument.
    pub instrument: InstrumentSettings,
    /// Poll loop cadence.
    #[serde(default)]
    pub polling: PollingSettings,
}

/// Where and how to reach the instrument.
#[derive(Debug, Deserialize, Clone)]
pub struct InstrumentSettings {
    /// Instrument hostname or IP address.
    pub host: String,
    /// TCP port of the instrument's command interface.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Time to wait for a TCP connection to come up.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Total read window of a single exchange. The instrument does not
    /// frame its responses, so every exchange collects bytes until this
    /// elapses or the byte budget fills.
    #[serde(with = "humantime_serde", default = "default_exchange_timeout")]
    pub exchange_timeout: Duration,
    /// Upper bound on the size of a single response.
    #[serde(default = "default_response_byte_budget")]
    pub response_byte_budget: usize,
}

/// Cadence of the tiered poll loop.
#[derive(Debug, Deserialize, Clone)]
pub struct PollingSettings {
    /// Idle wait between poll cycles.
    #[serde(with = "humantime_serde", default = "default_cycle_wait")]
    pub cycle_wait: Duration,
    /// Minimum interval between refreshes of the diagnostic group.
    #[serde(with = "humantime_serde", default = "default_medium_interval")]
    pub medium_interval: Duration,
    /// Minimum interval between refreshes of the static-info group.
    #[serde(with = "humantime_serde", default = "default_slow_interval")]
    pub slow_interval: Duration,
    /// Capacity of the cache-notification broadcast channel.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            cycle_wait: default_cycle_wait(),
            medium_interval: default_medium_interval(),
            slow_interval: default_slow_interval(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

fn default_port() -> u16 {
    80
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_exchange_timeout() -> Duration {
    Duration::from_millis(200)
}

fn default_response_byte_budget() -> usize {
    150_000
}

fn default_cycle_wait() -> Duration {
    Duration::from_millis(250)
}

fn default_medium_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_slow_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_broadcast_capacity() -> usize {
    64
}

impl Settings {
    /// Load `config/<name>.toml`, falling back to `config/default.toml`.
    pub fn new(config_name: Option<&str>) -> RgaResult<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path))
            .build()
            .map_err(RgaError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(RgaError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from an explicit file path.
    pub fn from_path(path: &Path) -> RgaResult<Self> {
        let s = Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(RgaError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(RgaError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> RgaResult<()> {
        if self.instrument.host.is_empty() {
            return Err(RgaError::Configuration(
                "instrument host must not be empty".to_string(),
            ));
        }
        if self.instrument.exchange_timeout.is_zero() {
            return Err(RgaError::Configuration(
                "exchange_timeout must be positive".to_string(),
            ));
        }
        if self.instrument.response_byte_budget == 0 {
            return Err(RgaError::Configuration(
                "response_byte_budget must be positive".to_string(),
            ));
        }
        if self.polling.cycle_wait.is_zero() {
            return Err(RgaError::Configuration(
                "polling cycle_wait must be positive".to_string(),
            ));
        }
        if self.polling.broadcast_capacity == 0 {
            return Err(RgaError::Configuration(
                "broadcast_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("test.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
log_level = "debug"

[instrument]
host = "10.0.0.42"
port = 8080
exchange_timeout = "150ms"

[polling]
cycle_wait = "100ms"
medium_interval = "2s"
slow_interval = "4s"
"#,
        );

        let settings = Settings::from_path(&path).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.instrument.host, "10.0.0.42");
        assert_eq!(settings.instrument.port, 8080);
        assert_eq!(
            settings.instrument.exchange_timeout,
            Duration::from_millis(150)
        );
        assert_eq!(settings.polling.cycle_wait, Duration::from_millis(100));
        assert_eq!(settings.polling.medium_interval, Duration::from_secs(2));
        assert_eq!(settings.polling.slow_interval, Duration::from_secs(4));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
log_level = "info"

[instrument]
host = "rga.local"
"#,
        );

        let settings = Settings::from_path(&path).unwrap();
        assert_eq!(settings.instrument.port, 80);
        assert_eq!(
            settings.instrument.exchange_timeout,
            Duration::from_millis(200)
        );
        assert_eq!(settings.instrument.response_byte_budget, 150_000);
        assert_eq!(settings.polling.cycle_wait, Duration::from_millis(250));
        assert_eq!(settings.polling.medium_interval, Duration::from_secs(5));
        assert_eq!(settings.polling.slow_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
log_level = "info"

[instrument]
host = "rga.local"
exchange_timeout = "0s"
"#,
        );

        let err = Settings::from_path(&path).unwrap_err();
        assert!(matches!(err, RgaError::Configuration(_)));
    }

    #[test]
    fn test_empty_host_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
log_level = "info"

[instrument]
host = ""
"#,
        );

        let err = Settings::from_path(&path).unwrap_err();
        assert!(matches!(err, RgaError::Configuration(_)));
    }
}
