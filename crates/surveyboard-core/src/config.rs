//! Configuration for the status cache
//!
//! [`CacheConfig`] is what the cache is constructed with. [`Settings`] is the
//! on-disk TOML form (`<config_dir>/surveyboard/config.toml`) that the binary
//! turns into a `CacheConfig` plus a database location.

use crate::error::CoreError;
use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default freshness window for cached records
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Configuration for the status cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a cached record counts as fresh
    pub ttl: Duration,

    /// Categories looked up on every fetch, in output order
    pub categories: Vec<Category>,

    /// Capacity of the status event channel
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            categories: Category::default_set(),
            event_capacity: 256,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    /// Yearly categories only, in configured order
    pub fn years(&self) -> Vec<u16> {
        self.categories.iter().filter_map(Category::year).collect()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ttl.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "ttl must be greater than zero".to_string(),
            });
        }
        if self.categories.is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "at least one category is required".to_string(),
            });
        }
        if let Some(year) = self.years().into_iter().find(|y| !(1000..=9999).contains(y)) {
            return Err(CoreError::InvalidConfig {
                message: format!("survey year must have four digits: {}", year),
            });
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(*category) {
                return Err(CoreError::InvalidConfig {
                    message: format!("duplicate category: {}", category),
                });
            }
        }
        if self.event_capacity == 0 {
            return Err(CoreError::InvalidConfig {
                message: "event_capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// On-disk settings (TOML)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Freshness window in seconds
    pub ttl_secs: u64,

    /// Survey years to check, in display order
    pub years: Vec<u16>,

    /// Append the `current` fallback category
    pub include_current: bool,

    /// SQLite database holding the `survey_<year>_responses` tables
    pub database: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            years: vec![2021, 2022, 2023, 2024],
            include_current: true,
            database: None,
        }
    }
}

impl Settings {
    /// Default location: `<config_dir>/surveyboard/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("surveyboard").join("config.toml"))
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CoreError::ConfigRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let settings = Self::parse(&content, path)?;
        info!(path = %path.display(), years = ?settings.years, "Loaded config");
        Ok(settings)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
            source: e,
        })
    }

    /// Build and validate a cache configuration from these settings
    pub fn cache_config(&self) -> Result<CacheConfig, CoreError> {
        let mut categories: Vec<Category> = self.years.iter().copied().map(Category::Year).collect();
        if self.include_current {
            categories.push(Category::Current);
        }

        let config = CacheConfig::default()
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .with_categories(categories);
        config.validate()?;
        Ok(config)
    }
}
