//! Configuration schema (spanline.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_database() -> String {
    "postgres".to_string()
}

fn default_search_path() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_max_depth() -> usize {
    64
}

fn default_fail_open() -> bool {
    true
}

/// Settings for the span resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Database used for unqualified names
    #[serde(default = "default_database")]
    pub default_database: String,

    /// Ordered schema search path
    #[serde(default = "default_search_path")]
    pub search_path: Vec<String>,

    /// Maximum nesting of subqueries, views and function bodies
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Return degraded spans for missing resources instead of failing
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_database: default_database(),
            search_path: default_search_path(),
            max_depth: default_max_depth(),
            fail_open: default_fail_open(),
        }
    }
}

/// Where catalog snapshots come from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to a catalog snapshot JSON file
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// PostgreSQL connection string for `sync-catalog`
    #[serde(default)]
    pub connection: Option<String>,

    /// Use TLS when connecting
    #[serde(default)]
    pub tls: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Resolver settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Catalog source
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            catalog: CatalogConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Catalog path resolved against the project root
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.project_root.join(p)
            }
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.max_depth == 0 {
            return Err(ConfigError::Invalid("analysis.max_depth must be at least 1".to_string()));
        }
        if self.analysis.search_path.is_empty() {
            return Err(ConfigError::Invalid("analysis.search_path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
