use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::settings::SettingsStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_assets_refresh")]
    pub assets_refresh_secs: u64,
    #[serde(default = "default_top_coins_refresh")]
    pub top_coins_refresh_secs: u64,
    #[serde(default = "default_coin_refresh")]
    pub coin_refresh_secs: u64,
    #[serde(default = "default_redraw")]
    pub redraw_millis: u64,
    /// CoinGecko pro key; empty uses the public API.
    #[serde(default)]
    pub coingecko_api_key: String,
    /// Overrides the location of the favourites/portfolio document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_assets_refresh() -> u64 {
    10
}

fn default_top_coins_refresh() -> u64 {
    60
}

fn default_coin_refresh() -> u64 {
    10
}

fn default_redraw() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            assets_refresh_secs: default_assets_refresh(),
            top_coins_refresh_secs: default_top_coins_refresh(),
            coin_refresh_secs: default_coin_refresh(),
            redraw_millis: default_redraw(),
            coingecko_api_key: String::new(),
            data_file: None,
        }
    }
}

impl Config {
    /// Load from `path` when given, failing if it cannot be read. Otherwise
    /// load the default file, creating it on first run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let contents = fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config {}", p.display()))?;
                Self::parse(&contents)?
            }
            None => {
                let p = Self::config_path();
                if p.exists() {
                    Self::parse(&fs::read_to_string(&p)?)?
                } else {
                    let cfg = Config::default();
                    if let Err(e) = cfg.save(&p) {
                        tracing::warn!(error = %e, "could not write default config");
                    }
                    cfg
                }
            }
        };
        Ok(cfg)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(contents).context("Invalid config")?;
        cfg.assets_refresh_secs = cfg.assets_refresh_secs.max(5);
        cfg.top_coins_refresh_secs = cfg.top_coins_refresh_secs.max(10);
        cfg.coin_refresh_secs = cfg.coin_refresh_secs.max(5);
        cfg.redraw_millis = cfg.redraw_millis.clamp(100, 10_000);
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("coinwatch");
        path.push("config.yaml");
        path
    }

    pub fn settings_store(&self) -> SettingsStore {
        match &self.data_file {
            Some(p) => SettingsStore::new(p.clone()),
            None => SettingsStore::new(SettingsStore::default_path()),
        }
    }

    pub fn assets_period(&self) -> Duration {
        Duration::from_secs(self.assets_refresh_secs)
    }

    pub fn top_coins_period(&self) -> Duration {
        Duration::from_secs(self.top_coins_refresh_secs)
    }

    pub fn coin_period(&self) -> Duration {
        Duration::from_secs(self.coin_refresh_secs)
    }

    pub fn redraw_period(&self) -> Duration {
        Duration::from_millis(self.redraw_millis)
    }
}
