//! Runtime configuration: an optional YAML file with environment overrides.

use anyhow::{bail, Context, Result};
use expansion::{EngineConfig, DEFAULT_STORE_TIMEOUT};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "quests.yaml";

pub const ENV_DATABASE_URL: &str = "QUESTS_DATABASE_URL";
pub const ENV_STORE_TIMEOUT_MS: &str = "QUESTS_STORE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,
    pub store_timeout_ms: u64,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: persistence::default_sqlite_url().to_string(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            log_filter: None,
        }
    }
}

impl AppConfig {
    /// File at `path` (or the default file if present), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(raw) = lookup(ENV_STORE_TIMEOUT_MS) {
            self.store_timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_STORE_TIMEOUT_MS}={raw:?} is not a number"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            bail!("database_url must not be empty");
        }
        if self.store_timeout_ms == 0 {
            bail!("store_timeout_ms must be > 0");
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }
}
