use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Trackers shown per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Number of distinct thread-id sets kept in the hydration cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Age after which cached threads are revalidated
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Delay before the refresh control stops showing as busy
    #[serde(default = "default_refresh_reset_ms")]
    pub refresh_reset_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            cache_capacity: default_cache_capacity(),
            stale_after_secs: default_stale_after_secs(),
            refresh_reset_ms: default_refresh_reset_ms(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl TrackerConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn refresh_reset(&self) -> Duration {
        Duration::from_millis(self.refresh_reset_ms)
    }
}

/// Where thread trackers are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    /// Requires the `sqlite` feature
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_page_size() -> usize {
    20
}

fn default_cache_capacity() -> usize {
    64
}

fn default_stale_after_secs() -> u64 {
    30
}

fn default_refresh_reset_ms() -> u64 {
    1000
}

fn default_max_concurrent() -> usize {
    10
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".mail-triage/trackers.json")
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TriageError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.tracker.page_size == 0 {
            return Err(TriageError::ConfigError(
                "tracker.page_size must be at least 1".to_string(),
            ));
        }
        if self.tracker.page_size > 100 {
            return Err(TriageError::ConfigError(
                "tracker.page_size cannot exceed 100".to_string(),
            ));
        }

        if self.tracker.cache_capacity == 0 {
            return Err(TriageError::ConfigError(
                "tracker.cache_capacity must be at least 1".to_string(),
            ));
        }

        if self.tracker.max_concurrent_requests == 0 {
            return Err(TriageError::ConfigError(
                "tracker.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.tracker.max_concurrent_requests > 50 {
            return Err(TriageError::ConfigError(
                "tracker.max_concurrent_requests cannot exceed 50 (Gmail API per-user quota)"
                    .to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Sqlite && !cfg!(feature = "sqlite") {
            return Err(TriageError::ConfigError(
                "store.backend = \"sqlite\" requires building with the sqlite feature".to_string(),
            ));
        }

        Ok(())
    }

    /// Example configuration written by `init-config`
    pub fn example_toml() -> String {
        r#"# mail-triage configuration

[tracker]
# Trackers shown per page
page_size = 20
# Distinct thread-id sets kept in the hydration cache
cache_capacity = 64
# Seconds before cached threads are refetched
stale_after_secs = 30
# Milliseconds the refresh control stays busy after a reload
refresh_reset_ms = 1000
# Concurrent Gmail API requests while hydrating threads (1-50)
max_concurrent_requests = 10

[store]
# "json", or "sqlite" when built with the sqlite feature
backend = "json"
path = ".mail-triage/trackers.json"
"#
        .to_string()
    }
}
