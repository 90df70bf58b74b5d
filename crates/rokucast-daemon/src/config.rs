//! Configuration loading

use anyhow::{Context, Result};
use rokucast_discovery::{ScanConfig, DEFAULT_EXCLUDED_INTERFACES};
use rokucast_ecp::{EcpClient, ECP_PORT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub cast: CastConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Device control port probed on every host
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-probe timeout
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Cap on concurrent probes (unset probes every host at once)
    #[serde(default)]
    pub max_in_flight: Option<usize>,
    /// Bound on local address gathering
    #[serde(default = "default_gather_timeout")]
    pub gather_timeout_ms: u64,
    /// Interface name prefixes never used for local addresses
    #[serde(default = "default_exclude_interfaces")]
    pub exclude_interfaces: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            probe_timeout_ms: default_probe_timeout(),
            max_in_flight: None,
            gather_timeout_ms: default_gather_timeout(),
            exclude_interfaces: default_exclude_interfaces(),
        }
    }
}

fn default_port() -> u16 {
    ECP_PORT
}

fn default_probe_timeout() -> u64 {
    2000
}

fn default_gather_timeout() -> u64 {
    5000
}

fn default_exclude_interfaces() -> Vec<String> {
    DEFAULT_EXCLUDED_INTERFACES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastConfig {
    /// Timeout of the launch request
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
    /// Channel variant used until one is saved (`"0"` is the primary channel)
    #[serde(default = "default_app_id")]
    pub app_id: String,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            launch_timeout_secs: default_launch_timeout(),
            app_id: default_app_id(),
        }
    }
}

fn default_launch_timeout() -> u64 {
    30
}

fn default_app_id() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Settings file holding the selected device
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    "rokucast-settings.json".to_string()
}

impl Config {
    /// Device client with the configured port and timeouts
    pub fn ecp_client(&self) -> Result<EcpClient> {
        let client = EcpClient::new()
            .context("Failed to build HTTP client")?
            .with_port(self.discovery.port)
            .with_probe_timeout(Duration::from_millis(self.discovery.probe_timeout_ms))
            .with_launch_timeout(Duration::from_secs(self.cast.launch_timeout_secs));
        Ok(client)
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            max_in_flight: self.discovery.max_in_flight,
        }
    }

    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery.gather_timeout_ms)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("rokucast.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.discovery.port, 8060);
        assert_eq!(config.discovery.probe_timeout_ms, 2000);
        assert_eq!(config.discovery.max_in_flight, None);
        assert_eq!(config.cast.launch_timeout_secs, 30);
        assert_eq!(config.cast.app_id, "0");
        assert_eq!(
            config.discovery.exclude_interfaces,
            vec!["lo", "docker", "br-", "veth"]
        );
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rokucast.toml");
        std::fs::write(
            &path,
            r#"
[daemon]
bind = "0.0.0.0:9000"

[discovery]
max_in_flight = 32

[cast]
app_id = "1"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:9000");
        assert_eq!(config.discovery.max_in_flight, Some(32));
        assert_eq!(config.discovery.gather_timeout_ms, 5000);
        assert_eq!(config.storage.path, "rokucast-settings.json");
        assert_eq!(config.scan_config().max_in_flight, Some(32));
        assert_eq!(config.cast.app_id, "1");
        assert_eq!(config.cast.launch_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rokucast.toml");
        std::fs::write(&path, "[discovery]\nport = \"eighty\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_ecp_client_uses_configured_values() {
        let mut config = Config::default();
        config.discovery.port = 18060;
        config.discovery.probe_timeout_ms = 750;

        let client = config.ecp_client().unwrap();
        assert_eq!(client.port(), 18060);
        assert_eq!(client.probe_timeout(), Duration::from_millis(750));
    }
}
