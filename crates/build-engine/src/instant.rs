//! Instant experience planning
//!
//! Picks the instant-eligible modules that fit under the per-module size
//! ceiling. Oversized modules are dropped with a warning; losing the entry
//! module is fatal.

use tracing::{info, warn};

use bundlekit_core::bundle::BASE_MODULE_NAME;
use bundlekit_core::{BuildSettings, DeviceTier, SdkVersion};

use crate::content::ResolvedBundle;
use crate::size::{format_size, ContentSizeBreakdown};
use crate::BuildError;

/// Modules admitted to the instant variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantPlan {
    pub sdk: SdkVersion,
    pub tier: Option<DeviceTier>,
    /// Admitted modules in bundle order, entry module first
    pub modules: Vec<String>,
    /// One `InstantSizeExceeded` per dropped module
    pub dropped: Vec<BuildError>,
}

impl InstantPlan {
    pub fn includes(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }
}

/// Size-check the instant-eligible modules at the given bucket
///
/// Returns `None` when the bundle declares no instant modules or instant
/// generation is disabled.
pub fn plan_instant(
    bundle: &ResolvedBundle,
    settings: &BuildSettings,
    sdk: SdkVersion,
    tier: Option<DeviceTier>,
) -> Result<Option<InstantPlan>, BuildError> {
    if !settings.generate_instant || bundle.metadata.instant_modules.is_empty() {
        return Ok(None);
    }

    let mut modules = Vec::new();
    let mut dropped = Vec::new();

    for module in bundle.modules.iter().filter(|m| bundle.metadata.is_instant(&m.name)) {
        let breakdown = ContentSizeBreakdown::calculate(module.entries_for(sdk, tier));

        if breakdown.total > settings.instant_size_limit {
            warn!(
                "Dropping module '{}' from the instant variant: {} exceeds the {} limit",
                module.name,
                breakdown.summary(),
                format_size(settings.instant_size_limit)
            );
            dropped.push(BuildError::InstantSizeExceeded {
                module: module.name.clone(),
                size: breakdown.total,
                limit: settings.instant_size_limit,
            });
        } else {
            modules.push(module.name.clone());
        }
    }

    if !modules.iter().any(|m| m == BASE_MODULE_NAME) {
        let reason = if bundle.metadata.is_instant(BASE_MODULE_NAME) {
            format!("entry module '{}' exceeds the size limit", BASE_MODULE_NAME)
        } else {
            format!("entry module '{}' is not instant-eligible", BASE_MODULE_NAME)
        };
        return Err(BuildError::InstantVariantEmpty(reason));
    }

    info!("Instant variant admits {} module(s), dropped {}", modules.len(), dropped.len());
    Ok(Some(InstantPlan {
        sdk,
        tier,
        modules,
        dropped,
    }))
}
