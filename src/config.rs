//! Configuration Management
//!
//! Handles persistent configuration storage for awsrows.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aws::regions;
use crate::hydrate::GLOBAL_REGION;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Regions to query
    #[serde(default)]
    pub regions: Vec<String>,
    /// Region of the STS client (first valid entry of `regions` when unset)
    #[serde(default)]
    pub default_region: Option<String>,
    /// Shared config profile for credentials and region
    #[serde(default)]
    pub profile: Option<String>,
    /// STS endpoint override (local emulator)
    #[serde(default)]
    pub sts_endpoint: Option<String>,
    /// Maximum SDK attempts per STS call
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("awsrows").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective regions (config > AWS region chain > global)
    pub async fn effective_regions(&self) -> Vec<String> {
        let configured = self.configured_regions();
        if !configured.is_empty() {
            return configured;
        }

        let region = regions::default_region(self.profile.as_deref()).await;
        vec![region.unwrap_or_else(|| GLOBAL_REGION.to_string())]
    }

    /// Valid regions from the config file
    pub fn configured_regions(&self) -> Vec<String> {
        self.regions
            .iter()
            .filter(|r| {
                let valid = regions::validate_region(r);
                if !valid {
                    tracing::warn!("Skipping invalid region in config: {}", r);
                }
                valid
            })
            .cloned()
            .collect()
    }

    /// Region for the STS client, if the config names one
    pub fn default_region(&self) -> Option<String> {
        self.default_region
            .clone()
            .filter(|r| regions::validate_region(r))
            .or_else(|| self.configured_regions().into_iter().next())
    }

    /// Get effective STS endpoint (config > AWS_ENDPOINT_URL_STS > AWS_ENDPOINT_URL)
    pub fn effective_endpoint(&self) -> Option<String> {
        self.sts_endpoint
            .clone()
            .or_else(|| std::env::var("AWS_ENDPOINT_URL_STS").ok())
            .or_else(|| std::env::var("AWS_ENDPOINT_URL").ok())
            .filter(|e| !e.is_empty())
    }

    /// Set regions and save
    pub fn set_regions(&mut self, regions: Vec<String>) -> Result<()> {
        self.regions = regions;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_regions_win() {
        let config = Config {
            regions: vec!["us-east-1".to_string(), "bogus region".to_string()],
            ..Default::default()
        };
        assert_eq!(config.configured_regions(), vec!["us-east-1".to_string()]);
    }

    #[tokio::test]
    async fn test_effective_regions_prefer_config() {
        let config = Config {
            regions: vec!["eu-west-1".to_string()],
            ..Default::default()
        };
        assert_eq!(config.effective_regions().await, vec!["eu-west-1".to_string()]);
    }

    #[test]
    fn test_default_region() {
        let config = Config {
            regions: vec!["bogus".to_string(), "cn-north-1".to_string()],
            ..Default::default()
        };
        assert_eq!(config.default_region().as_deref(), Some("cn-north-1"));

        let config = Config {
            default_region: Some("us-gov-west-1".to_string()),
            regions: vec!["us-east-1".to_string()],
            ..Default::default()
        };
        assert_eq!(config.default_region().as_deref(), Some("us-gov-west-1"));

        assert_eq!(Config::default().default_region(), None);
    }

    #[test]
    fn test_configured_endpoint_wins() {
        let config = Config {
            sts_endpoint: Some("http://localhost:4566".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_endpoint().as_deref(),
            Some("http://localhost:4566")
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("awsrows-config-{}", std::process::id()))
            .join("config.json");
        let config = Config {
            regions: vec!["eu-central-1".to_string()],
            default_region: None,
            profile: Some("prod".to_string()),
            sts_endpoint: None,
            max_attempts: Some(2),
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_fields_default() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }
}
