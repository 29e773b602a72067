//! bundlekit - device-targeted split and variant generation
//!
//! Turns a modular app bundle into the set of installable variants a
//! distribution service serves, and answers which APKs a given device gets.
//!
//! ## Architecture
//!
//! - `bundlekit-core`: targeting model, build result tree, bundle descriptors,
//!   result classifier and configuration
//! - `bundlekit-build-engine`: split generation, variant assembly and the
//!   async build runner
//! - `bundlekit-device-matcher`: device specifications and variant/APK selection

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use bundlekit_build_engine as build;
pub use bundlekit_core as core;
pub use bundlekit_device_matcher as matcher;

/// bundlekit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use bundlekit_build_engine::{BuildError, BuildOutput, BuildProgress, BuildRunner, VariantAssembler};
    pub use bundlekit_core::config::AppConfig;
    pub use bundlekit_core::results::{
        instant_apk_variants, is_instant_apk_variant, is_split_apk_variant, is_standalone_apk_variant,
        split_variants, standalone_variants,
    };
    pub use bundlekit_core::{Bundle, BuildResult, BuildSettings, Variant, VariantKind};
    pub use bundlekit_device_matcher::{DeviceMatcher, DeviceSpec, MatchError};
}
