//! Error types for bundlekit
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::model::VariantKind;
use crate::targeting::Dimension;

/// Main error type for the core crate
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Targeting error: {0}")]
    Targeting(#[from] TargetingError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// A targeting tag or targeting record that cannot be interpreted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetingError {
    #[error("unknown targeting dimension '{0}'")]
    UnknownDimension(String),

    #[error("unknown {dimension} value '{value}'")]
    UnknownValue { dimension: Dimension, value: String },

    #[error("{dimension} value '{value}' also listed in its own alternatives")]
    ValueInAlternatives { dimension: Dimension, value: String },
}

/// Structural violation in the build result model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("APK set for module '{module}' has {count} master splits, expected exactly one")]
    MasterCount { module: String, count: usize },

    #[error("{kind} variant has no APK sets")]
    EmptyVariant { kind: VariantKind },

    #[error("standalone variant must hold one APK set with one APK, found {apk_sets} set(s) and {apks} APK(s)")]
    StandaloneShape { apk_sets: usize, apks: usize },
}
