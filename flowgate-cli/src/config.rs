//! Configuration loading and parsing

use anyhow::{Context, Result};
use flowgate_core::{BridgeConfig, GateConfig, MonitorConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from flowgate.toml)
///
/// Every section is optional; missing sections use the reference deployment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.gate.validate().context("Invalid [gate] section")?;
        self.monitor.validate().context("Invalid [monitor] section")?;
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}
