//! Configuration management for Proofchain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default)]
    pub resolve_on_startup: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
            resolve_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Per-peer limit for fetching a chain, e.g. `"5s"`.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    /// Deadline for one proof search, e.g. `"10m"`.
    #[serde(default = "default_solve_timeout")]
    pub solve_timeout: String,
    /// Reward recipient for mined blocks; a random id is generated when empty.
    #[serde(default)]
    pub node_id: String,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            solve_timeout: default_solve_timeout(),
            node_id: String::new(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ChainError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ChainError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Result<Duration, ChainError> {
        parse_positive_duration("sync.fetch_timeout", &self.sync.fetch_timeout)
    }

    pub fn solve_timeout(&self) -> Result<Duration, ChainError> {
        parse_positive_duration("miner.solve_timeout", &self.miner.solve_timeout)
    }

    fn validate(&self) -> Result<(), ChainError> {
        if self.network.host.trim().is_empty() {
            return Err(ChainError::ConfigError("network.host must be set".to_string()));
        }
        if self.network.api_port == 0 {
            return Err(ChainError::ConfigError("network.api_port must be non-zero".to_string()));
        }
        self.fetch_timeout()?;
        self.solve_timeout()?;
        Ok(())
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

fn parse_positive_duration(key: &str, value: &str) -> Result<Duration, ChainError> {
    let duration = humantime::parse_duration(value)
        .map_err(|e| ChainError::ConfigError(format!("{} = {:?}: {}", key, value, e)))?;
    if duration.is_zero() {
        return Err(ChainError::ConfigError(format!("{} must be greater than zero", key)));
    }
    Ok(duration)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_fetch_timeout() -> String {
    "5s".to_string()
}

fn default_solve_timeout() -> String {
    "10m".to_string()
}
