//! # Ledger Configuration
//!
//! Configuration for the BizLedger engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BIZLEDGER_DB_PATH=/var/lib/bizledger/ledger.db                     │
//! │     BIZLEDGER_LOW_STOCK_THRESHOLD=5                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bizledger/bizledger.toml (Linux)                         │
//! │     ~/Library/Application Support/com.bizledger.bizledger/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # bizledger.toml
//! [database]
//! path = "/var/lib/bizledger/ledger.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [inventory]
//! default_category = "General"
//! low_stock_threshold = 10.0
//!
//! [ids]
//! width = 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;
use bizledger_core::{DEFAULT_ITEM_CATEGORY, DEFAULT_LOW_STOCK_THRESHOLD};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config could not be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is outside its allowed range.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Neither an explicit path nor a platform config directory is available.
    #[error("No config path available")]
    NoConfigPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Database file. Defaults to `bizledger.db` in the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

/// `[inventory]` section: defaults for items a purchase creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySection {
    #[serde(default = "default_category")]
    pub default_category: String,

    #[serde(default = "default_threshold")]
    pub low_stock_threshold: f64,
}

fn default_category() -> String {
    DEFAULT_ITEM_CATEGORY.to_string()
}
fn default_threshold() -> f64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

impl Default for InventorySection {
    fn default() -> Self {
        InventorySection {
            default_category: default_category(),
            low_stock_threshold: default_threshold(),
        }
    }
}

/// `[ids]` section: generated identifier format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdSection {
    /// Zero-pad width of the numeric part (`C0001` is width 4).
    #[serde(default = "default_id_width")]
    pub width: usize,
}

fn default_id_width() -> usize {
    4
}

impl Default for IdSection {
    fn default() -> Self {
        IdSection {
            width: default_id_width(),
        }
    }
}

// =============================================================================
// Ledger Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub inventory: InventorySection,

    #[serde(default)]
    pub ids: IdSection,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (bizledger.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "database.min_connections must not exceed max_connections".into(),
            ));
        }
        if self.inventory.default_category.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "inventory.default_category must not be empty".into(),
            ));
        }
        if !self.inventory.low_stock_threshold.is_finite() || self.inventory.low_stock_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "inventory.low_stock_threshold must be a non-negative number".into(),
            ));
        }
        if !(1..=12).contains(&self.ids.width) {
            return Err(ConfigError::Invalid("ids.width must be between 1 and 12".into()));
        }
        Ok(())
    }

    /// Applies `BIZLEDGER_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BIZLEDGER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(max) = lookup("BIZLEDGER_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid BIZLEDGER_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(category) = lookup("BIZLEDGER_DEFAULT_CATEGORY") {
            self.inventory.default_category = category;
        }

        if let Some(threshold) = lookup("BIZLEDGER_LOW_STOCK_THRESHOLD") {
            match threshold.parse::<f64>() {
                Ok(t) => self.inventory.low_stock_threshold = t,
                Err(_) => warn!(value = %threshold, "Ignoring invalid BIZLEDGER_LOW_STOCK_THRESHOLD"),
            }
        }

        if let Some(width) = lookup("BIZLEDGER_ID_WIDTH") {
            if let Ok(w) = width.parse::<usize>() {
                self.ids.width = w;
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "bizledger", "bizledger")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("bizledger.toml"))
    }

    /// Database file path: configured, or `bizledger.db` in the data dir.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("bizledger.db")))
            .ok_or(ConfigError::NoConfigPath)
    }

    /// Pool configuration for [`crate::pool::Database::new`].
    pub fn db_config(&self) -> ConfigResult<DbConfig> {
        let path = self.database_path()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs)))
    }

    /// Engine settings derived from this configuration.
    pub fn settings(&self) -> LedgerSettings {
        LedgerSettings {
            default_category: self.inventory.default_category.clone(),
            low_stock_threshold: self.inventory.low_stock_threshold,
            id_width: self.ids.width,
        }
    }
}

/// Runtime settings the reconcilers and id generator read.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSettings {
    pub default_category: String,
    pub low_stock_threshold: f64,
    pub id_width: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerConfig::default().settings()
    }
}
