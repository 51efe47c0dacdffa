// VPN Kill Switch - Configuration
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Engine settings kept in a local JSON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::FirewallSettings;

const APP_DIR: &str = "vpn-killswitch";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound on waiting for the filter engine lock, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Where persistent filter objects are kept between runs.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Arm the boot-time block on shutdown when the last policy was blocking.
    #[serde(default = "default_block_on_exit")]
    pub block_on_exit: bool,
    #[serde(default)]
    pub settings: FirewallSettings,
}

fn default_timeout_secs() -> u64 { 5 }
fn default_block_on_exit() -> bool { true }

fn default_state_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("store.json")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            state_file: default_state_file(),
            block_on_exit: default_block_on_exit(),
            settings: FirewallSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Location of the user's configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Load from the default location.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`. A missing, unreadable or malformed file yields the
    /// defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse configuration: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Save to the default location.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("serializing configuration")?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("absent.json"));
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.block_on_exit);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "timeout_secs": 2, "settings": { "allow_lan": true } }"#).unwrap();

        let config = EngineConfig::load_from(&path);
        assert_eq!(config.timeout_secs, 2);
        assert!(config.settings.allow_lan);
        assert!(!config.settings.allow_dhcp);
        assert_eq!(config.state_file, default_state_file());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ timeout_secs: ").unwrap();
        assert_eq!(EngineConfig::load_from(&path), EngineConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EngineConfig {
            timeout_secs: 9,
            state_file: dir.path().join("store.json"),
            block_on_exit: false,
            settings: FirewallSettings::new(true, true),
        };
        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path), config);
    }
}
