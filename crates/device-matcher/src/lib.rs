//! bundlekit Device Matcher
//!
//! Resolves a concrete device specification against a build result: which
//! variant the device installs and which APKs of every module it receives.

pub mod device;
pub mod matcher;

pub use device::DeviceSpec;
pub use matcher::DeviceMatcher;

use bundlekit_core::{Dimension, SdkVersion};

/// Matching errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("No variant is compatible with the device (SDK {sdk_version})")]
    NoCompatibleVariant { sdk_version: SdkVersion },

    #[error("{dimension} splits of module '{module}' do not cover any value the device supports")]
    IncompleteTargeting { module: String, dimension: Dimension },
}
