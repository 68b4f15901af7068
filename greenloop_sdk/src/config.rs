// src/config.rs
// Dashboard configuration: JSON file with environment overrides.

use crate::error::{Result, SdkError};
use crate::feed::{DEFAULT_FEED_PATH, DEFAULT_POLL_INTERVAL};
use crate::hashscan::{HashscanNetwork, HashscanResolver};
use crate::ledger::DEFAULT_LEDGER_BOUND;
use crate::surface::DEFAULT_TOAST_DURATION;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "greenloop";
const CONFIG_FILE: &str = "config.json";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GreenloopConfig {
    /// Maximum number of evidence records kept
    #[serde(default = "default_ledger_bound")]
    pub ledger_bound: usize,
    /// Where the ledger file lives
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,
    #[serde(default = "default_feed_path")]
    pub feed_path: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_toast_duration")]
    pub toast_duration_secs: u64,
    /// Explorer network: mainnet, testnet or previewnet
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_ledger_bound() -> usize {
    DEFAULT_LEDGER_BOUND
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

fn default_feed_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_feed_path() -> String {
    DEFAULT_FEED_PATH.to_string()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_toast_duration() -> u64 {
    DEFAULT_TOAST_DURATION.as_secs()
}

fn default_network() -> String {
    HashscanNetwork::default().to_string()
}

impl Default for GreenloopConfig {
    fn default() -> Self {
        Self {
            ledger_bound: default_ledger_bound(),
            data_dir: default_data_dir(),
            feed_base_url: default_feed_base_url(),
            feed_path: default_feed_path(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            toast_duration_secs: default_toast_duration(),
            network: default_network(),
        }
    }
}

impl GreenloopConfig {
    /// Read `path`, or write the defaults there if it does not exist yet
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let json = fs::read_to_string(path)?;
            let config: GreenloopConfig = serde_json::from_str(&json)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            info!("Wrote default configuration to {}", path.display());
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Apply `GREENLOOP_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("GREENLOOP_FEED_URL") {
            self.feed_base_url = url;
        }
        if let Some(dir) = lookup("GREENLOOP_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(bound) = lookup("GREENLOOP_LEDGER_BOUND") {
            self.ledger_bound = bound.trim().parse().map_err(|_| {
                SdkError::InvalidConfig(format!(
                    "GREENLOOP_LEDGER_BOUND is not a number: {}",
                    bound
                ))
            })?;
        }
        if let Some(network) = lookup("GREENLOOP_NETWORK") {
            self.network = network;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger_bound == 0 {
            return Err(SdkError::InvalidConfig("ledger_bound must be at least 1".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(SdkError::InvalidConfig(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if !self.feed_path.starts_with('/') {
            return Err(SdkError::InvalidConfig(format!(
                "feed_path must start with '/': {}",
                self.feed_path
            )));
        }
        self.hashscan_network()?;
        Ok(())
    }

    pub fn hashscan_network(&self) -> Result<HashscanNetwork> {
        self.network.parse()
    }

    pub fn resolver(&self) -> Result<HashscanResolver> {
        Ok(HashscanResolver::new(self.hashscan_network()?))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_secs(self.toast_duration_secs)
    }
}

/// `<config dir>/greenloop/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.json");

        let created = GreenloopConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.ledger_bound, 100);
        assert_eq!(created.poll_interval_secs, 30);

        let loaded = GreenloopConfig::load_or_create(&path).unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"ledger_bound": 50}"#).unwrap();

        let config = GreenloopConfig::load_or_create(&path).unwrap();
        assert_eq!(config.ledger_bound, 50);
        assert_eq!(config.feed_path, "/api/mirror-feed");
        assert_eq!(config.network, "testnet");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("GREENLOOP_FEED_URL", "http://feed.test"),
            ("GREENLOOP_LEDGER_BOUND", "25"),
            ("GREENLOOP_NETWORK", "mainnet"),
        ]
        .into_iter()
        .collect();

        let config = GreenloopConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.feed_base_url, "http://feed.test");
        assert_eq!(config.ledger_bound, 25);
        assert_eq!(config.hashscan_network().unwrap(), HashscanNetwork::Mainnet);

        let bad = GreenloopConfig::default()
            .with_overrides(|k| (k == "GREENLOOP_LEDGER_BOUND").then(|| "lots".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate() {
        assert!(GreenloopConfig::default().validate().is_ok());

        let mut config = GreenloopConfig::default();
        config.ledger_bound = 0;
        assert!(config.validate().is_err());

        let mut config = GreenloopConfig::default();
        config.feed_path = "api/mirror-feed".to_string();
        assert!(config.validate().is_err());

        let mut config = GreenloopConfig::default();
        config.network = "devnet".to_string();
        assert!(config.validate().is_err());

        let mut config = GreenloopConfig::default();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
