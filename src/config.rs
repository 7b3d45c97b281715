use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    /// Per-item audit trail bound: only the most recent N observations
    /// are retained. Counters are unaffected by eviction.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
        }
    }
}

fn default_history_cap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.tracking.history_cap == 0 {
        anyhow::bail!("tracking.history_cap must be > 0");
    }

    Ok(config)
}
