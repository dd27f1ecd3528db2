//! Configuration file support for liveosc
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/liveosc/config.toml`
//! - macOS: `~/Library/Application Support/liveosc/config.toml`
//! - Windows: `%APPDATA%\liveosc\config.toml`

use crate::error::{Error, Result};
use crate::transport::Endpoint;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where Live's OSC remote script listens and where replies come back
    pub endpoint: EndpointSettings,
    /// Query and capture deadlines
    pub timeouts: TimeoutSettings,
    /// Pattern generation
    pub generation: GenerationSettings,
    /// Scene auto-play defaults
    pub autoplay: AutoPlaySettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "liveosc") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config_file(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// The transport endpoint described by this config
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            remote_host: self.endpoint.remote_host.clone(),
            remote_port: self.endpoint.remote_port,
            listen_host: self.endpoint.listen_host.clone(),
            listen_port: self.endpoint.listen_port,
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# liveosc configuration

[endpoint]
# Host and port where the AbletonOSC remote script listens
remote_host = "127.0.0.1"
remote_port = 11000
# Local address that receives replies from Live
listen_host = "127.0.0.1"
listen_port = 11001

[timeouts]
# How long a query waits for its reply
query_ms = 500
# How long the connection test waits for the first tempo reply
connect_ms = 3000
# How long a raw capture listens for every inbound message
raw_capture_ms = 500
# How long a timed-out query keeps its late reply from reaching newer queries
stale_grace_ms = 2000

[generation]
# Fixed seed for reproducible patterns (omit for fresh randomness each run)
# seed = 42

[autoplay]
# Bars each scene plays before the next one fires
default_bars_per_scene = 8
"#;

/// Remote and local addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub remote_host: String,
    pub remote_port: u16,
    pub listen_host: String,
    pub listen_port: u16,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            remote_host: "127.0.0.1".to_string(),
            remote_port: 11000,
            listen_host: "127.0.0.1".to_string(),
            listen_port: 11001,
        }
    }
}

/// Deadlines in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub query_ms: u64,
    pub connect_ms: u64,
    pub raw_capture_ms: u64,
    pub stale_grace_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            query_ms: 500,
            connect_ms: 3000,
            raw_capture_ms: 500,
            stale_grace_ms: 2000,
        }
    }
}

impl TimeoutSettings {
    pub fn query(&self) -> Duration {
        Duration::from_millis(self.query_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn raw_capture(&self) -> Duration {
        Duration::from_millis(self.raw_capture_ms)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_millis(self.stale_grace_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Seed for the session RNG; `None` seeds from the OS
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPlaySettings {
    pub default_bars_per_scene: u32,
}

impl Default for AutoPlaySettings {
    fn default() -> Self {
        Self {
            default_bars_per_scene: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.endpoint.remote_port, 11000);
        assert_eq!(config.endpoint.listen_port, 11001);
        assert_eq!(config.timeouts.query(), Duration::from_millis(500));
        assert_eq!(config.generation.seed, None);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.generation.seed = Some(7);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[endpoint]\nremote_port = 9000\n").unwrap();
        assert_eq!(parsed.endpoint.remote_port, 9000);
        assert_eq!(parsed.endpoint.remote_host, "127.0.0.1");
        assert_eq!(parsed.timeouts.connect_ms, 3000);
    }

    #[test]
    fn test_default_config_file_parses() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.autoplay.default_bars_per_scene = 16;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.autoplay.default_bars_per_scene, 16);
    }

    #[test]
    fn test_endpoint_from_config() {
        let endpoint = Config::default().endpoint();
        assert_eq!(endpoint.remote_addr(), "127.0.0.1:11000");
    }
}
