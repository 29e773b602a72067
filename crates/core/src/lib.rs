//! bundlekit Core - Targeting model and shared types
//!
//! This crate holds the vocabulary shared by the build engine and the device
//! matcher: targeting dimensions, the build result tree, the bundle input
//! descriptors, the result classifier and the application configuration.

pub mod bundle;
pub mod config;
pub mod error;
pub mod model;
pub mod results;
pub mod targeting;

pub use bundle::{Bundle, BundleMetadata, BundleModule, ContentEntry, ModuleDelivery, TargetingTag};
pub use config::{AppConfig, BuildSettings};
pub use error::{CoreError, ModelError, Result, TargetingError};
pub use model::{ApkDescription, ApkSet, BuildResult, EntryRef, Variant, VariantKind};
pub use targeting::{
    Abi, ApkTargeting, DeviceTier, Dimension, DimensionValue, Language, ScreenDensity, SdkVersion,
    Targeted, TextureCompressionFormat, VariantTargeting,
};

/// bundlekit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
