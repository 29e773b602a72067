//! bundlekit Build Engine
//!
//! Resolves bundle content targeting, splits every module into master and
//! split APKs, and assembles the per-module APK sets into device variants.

pub mod assembler;
pub mod content;
pub mod instant;
pub mod naming;
pub mod runner;
pub mod size;
pub mod splitter;
pub mod validation;

pub use assembler::{ModuleApkSets, SplitCombo, VariantAssembler, VariantPlan};
pub use content::{resolve_bundle, ResolvedBundle, ResolvedEntry, ResolvedModule, ValueSpaces};
pub use instant::InstantPlan;
pub use runner::{BuildProgress, BuildRunner};
pub use size::{format_size, ContentSizeBreakdown};
pub use splitter::SplitGenerator;

use bundlekit_core::{BuildResult, Dimension, ModelError};

/// Build errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Malformed targeting in module '{module}' at '{path}': {reason}")]
    MalformedTargeting { module: String, path: String, reason: String },

    #[error("Incomplete {dimension} targeting in module '{module}': no split covers {}", .missing.join(", "))]
    IncompleteTargeting {
        module: String,
        dimension: Dimension,
        missing: Vec<String>,
    },

    #[error("Module '{module}' is {size} bytes, over the {limit} byte instant limit")]
    InstantSizeExceeded { module: String, size: u64, limit: u64 },

    #[error("Instant variant has no entry module: {0}")]
    InstantVariantEmpty(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Duplicate module: {0}")]
    DuplicateModule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid build result: {0}")]
    Model(#[from] ModelError),

    #[error("Build task failed: {0}")]
    Task(String),
}

impl BuildError {
    /// Only an oversized instant module is dropped instead of failing the build
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BuildError::InstantSizeExceeded { .. })
    }

    /// Module the error was raised for, when there is one
    pub fn module(&self) -> Option<&str> {
        match self {
            BuildError::MalformedTargeting { module, .. }
            | BuildError::IncompleteTargeting { module, .. }
            | BuildError::InstantSizeExceeded { module, .. }
            | BuildError::UnknownModule(module)
            | BuildError::DuplicateModule(module) => Some(module),
            _ => None,
        }
    }
}

/// Result of a successful build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub result: BuildResult,
    /// Recoverable problems, such as modules dropped from the instant variant
    pub warnings: Vec<BuildError>,
}
