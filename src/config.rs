use crate::cache::RecencySignal;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_max_kept() -> usize {
    20
}

/// Cache retention settings loaded from `~/.config/fetchcache/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cache entries retained after a vacuum.
    #[serde(default = "default_max_kept")]
    pub max_kept: usize,
    /// Filesystem timestamp that ranks entry recency during eviction.
    #[serde(default)]
    pub recency: RecencySignal,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_kept: default_max_kept(),
            recency: RecencySignal::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchcache")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CacheConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CacheConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: CacheConfig = toml::from_str(&data)?;
    Ok(cfg)
}
