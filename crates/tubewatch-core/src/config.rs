use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tubewatch_detect::SelectorCatalog;

use crate::error::CoreError;
use crate::retry::RetryPolicy;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub ad_watch: AdWatchConfig,
    pub retry: RetryConfig,
    pub lookup: LookupConfig,
    pub cache: CacheConfig,
    pub selectors: SelectorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub debounce_ms: u64,
    pub rate_gate_ms: u64,
    pub url_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdWatchConfig {
    pub poll_ms: u64,
    pub settle_ms: u64,
    pub ceiling_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub growth: f64,
    pub max_delay_ms: u64,
    pub ad_floor_ms: u64,
    pub ad_growth: f64,
    pub ad_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub cache_responses: bool,
    /// Most oEmbed responses kept in memory.
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorsConfig {
    /// Extra selector catalog merged over the built-in one.
    pub user_catalog: Option<PathBuf>,
}

/// Timer settings the scheduler runs on, resolved to [`Duration`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub debounce: Duration,
    pub rate_gate: Duration,
    pub url_poll: Duration,
    pub ad_poll: Duration,
    pub ad_settle: Duration,
    pub ad_ceiling: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        AppConfig::default().timings()
    }
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config with the user file at `path` merged over the defaults.
    ///
    /// Keys missing from the user file keep their default values.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| CoreError::Config(e.to_string()))?;

        if path.exists() {
            debug!(path = %path.display(), "Loading user config");
            let user_str = std::fs::read_to_string(path)?;
            let user: toml::Table =
                toml::from_str(&user_str).map_err(|e| CoreError::Config(e.to_string()))?;
            merge_tables(&mut merged, user);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| CoreError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    pub fn timings(&self) -> Timings {
        Timings {
            debounce: Duration::from_millis(self.detection.debounce_ms),
            rate_gate: Duration::from_millis(self.detection.rate_gate_ms),
            url_poll: Duration::from_millis(self.detection.url_poll_ms.max(1)),
            ad_poll: Duration::from_millis(self.ad_watch.poll_ms.max(1)),
            ad_settle: Duration::from_millis(self.ad_watch.settle_ms),
            ad_ceiling: Duration::from_secs(self.ad_watch.ceiling_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let r = &self.retry;
        RetryPolicy {
            max_attempts: r.max_attempts.max(1),
            initial_delay: Duration::from_millis(r.initial_delay_ms),
            growth: r.growth,
            max_delay: Duration::from_millis(r.max_delay_ms),
            ad_floor: Duration::from_millis(r.ad_floor_ms),
            ad_growth: r.ad_growth,
            ad_max_delay: Duration::from_millis(r.ad_max_delay_ms),
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup.timeout_secs)
    }

    /// Built-in selector catalog with the configured user catalog merged in.
    pub fn selector_catalog(&self) -> Result<SelectorCatalog, CoreError> {
        let mut catalog = SelectorCatalog::embedded();
        if let Some(path) = &self.selectors.user_catalog {
            let user_str = std::fs::read_to_string(path)?;
            let user = SelectorCatalog::from_toml(&user_str)?;
            debug!(path = %path.display(), probes = user.len(), "Merging user selectors");
            catalog.merge_user(&user);
        }
        Ok(catalog)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "tubewatch")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

/// Recursively overlay `user` onto `base`; nested tables merge, other values
/// replace.
fn merge_tables(base: &mut toml::Table, user: toml::Table) {
    for (key, value) in user {
        match value {
            toml::Value::Table(user_inner) => {
                if let Some(toml::Value::Table(base_inner)) = base.get_mut(&key) {
                    merge_tables(base_inner, user_inner);
                } else {
                    base.insert(key, toml::Value::Table(user_inner));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
