//! Application Configuration
//!
//! Manages bundlekit settings:
//! - Variant generation (standalone threshold, instant ceiling, parallelism)
//! - Output formatting
//! - Logging

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::targeting::Dimension;

/// Lowest SDK level that installs split APKs
pub const DEFAULT_STANDALONE_THRESHOLD_SDK: u32 = 21;

/// Per-module compressed size ceiling for the instant experience
pub const DEFAULT_INSTANT_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Variant generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Platforms below this level get standalone APKs
    pub standalone_threshold_sdk: u32,
    /// Generate standalone variants when the bundle's min SDK allows them
    pub generate_standalones: bool,
    /// Generate the instant variant for instant-eligible modules
    pub generate_instant: bool,
    /// Compressed size ceiling per instant module, in bytes
    pub instant_size_limit: u64,
    /// Dimensions that produce split APKs; others stay in the master
    pub split_dimensions: Vec<Dimension>,
    /// Number of modules split concurrently
    pub parallel_jobs: usize,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            standalone_threshold_sdk: DEFAULT_STANDALONE_THRESHOLD_SDK,
            generate_standalones: true,
            generate_instant: true,
            instant_size_limit: DEFAULT_INSTANT_SIZE_LIMIT,
            split_dimensions: Dimension::SPLIT_DIMENSIONS.to_vec(),
            parallel_jobs: num_cpus::get(),
        }
    }
}

impl BuildSettings {
    pub fn splits_on(&self, dimension: Dimension) -> bool {
        dimension.is_split_dimension() && self.split_dimensions.contains(&dimension)
    }

    pub fn validate(&self) -> Result<()> {
        if self.standalone_threshold_sdk == 0 {
            return Err(CoreError::Config("standalone_threshold_sdk must be positive".into()));
        }
        if let Some(dim) = self.split_dimensions.iter().find(|d| !d.is_split_dimension()) {
            return Err(CoreError::Config(format!("{} cannot be used as a split dimension", dim)));
        }
        if self.parallel_jobs == 0 {
            return Err(CoreError::Config("parallel_jobs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Pretty-print JSON build results
    pub pretty_json: bool,
    /// Directory for build results when none is given on the command line
    pub output_dir: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            pretty_json: true,
            output_dir: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration version for migrations
    pub version: u32,
    pub build: BuildSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            build: BuildSettings::default(),
            output: OutputSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Default configuration file location
    pub fn config_file() -> Option<PathBuf> {
        ProjectDirs::from("dev", "bundlekit", "bundlekit")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location, creating it if missing
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| CoreError::Config("Cannot determine config path".into()))?;

        if config_file.exists() {
            Self::load_from(&config_file).await
        } else {
            info!("Config file not found, using defaults");
            let config = AppConfig::default();
            config.save_to(&config_file).await?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub async fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.build.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.build.standalone_threshold_sdk, 21);
        assert!(config.build.splits_on(Dimension::Language));
        assert!(!config.build.splits_on(Dimension::Sdk));
        assert!(config.build.parallel_jobs >= 1);
        assert!(config.build.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [build]
            standalone_threshold_sdk = 23
            split_dimensions = ["abi", "language"]
            "#,
        )
        .unwrap();

        assert_eq!(config.build.standalone_threshold_sdk, 23);
        assert!(!config.build.splits_on(Dimension::Density));
        assert_eq!(config.build.instant_size_limit, DEFAULT_INSTANT_SIZE_LIMIT);
        assert!(config.output.pretty_json);
    }

    #[test]
    fn test_reject_variant_dimension_as_split() {
        let settings = BuildSettings {
            split_dimensions: vec![Dimension::DeviceTier],
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.build.instant_size_limit = 5 * 1024 * 1024;
        config.save_to(&path).await.unwrap();

        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}
