//! Runtime configuration.
//!
//! Sources, later ones winning: built-in defaults, then
//! `<config_dir>/ncmstream/config.toml`, then `NCMSTREAM_*` environment
//! variables, then command-line flags (applied by `main`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const ENV_CACHE_DIR: &str = "NCMSTREAM_CACHE_DIR";
const ENV_PORT: &str = "NCMSTREAM_PORT";
const ENV_LOG: &str = "NCMSTREAM_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root holding the `media/` and `lyrics/` caches.
    pub cache_dir: PathBuf,
    /// Loopback port for `serve`; `0` picks a free one.
    pub port: u16,
    pub upstream_timeout_secs: u64,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ncmstream"),
            port: 0,
            upstream_timeout_secs: netease_stream::DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
            log_level: "info".into(),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the config file (if any) and the environment.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.upstream_timeout_secs == 0 {
            anyhow::bail!("upstream_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Override fields from `NCMSTREAM_*` variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var(ENV_CACHE_DIR).filter(|s| !s.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(port) = var(ENV_PORT).filter(|s| !s.is_empty()) {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PORT}={port} is not a port number"))?;
        }
        if let Some(level) = var(ENV_LOG).filter(|s| !s.is_empty()) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn media_dir(&self) -> PathBuf {
        self.cache_dir.join("media")
    }

    pub fn lyrics_dir(&self) -> PathBuf {
        self.cache_dir.join("lyrics")
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// `~/.config/ncmstream/config.toml` on Linux.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ncmstream").join("config.toml"))
}
