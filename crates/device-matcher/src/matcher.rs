//! Device Matcher
//!
//! Picks the first variant, in build result order, whose targeting accepts
//! the device, then the master and matching splits of every module in it.

use tracing::{debug, info};

use bundlekit_core::{
    Abi, ApkDescription, ApkSet, ApkTargeting, BuildResult, DeviceTier, DimensionValue, Language, ScreenDensity,
    Targeted, TextureCompressionFormat, Variant, VariantKind,
};

use crate::device::DeviceSpec;
use crate::MatchError;

/// Split values chosen for the device within one APK set; `None` keeps the dimension on the master
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct SplitChoice {
    abi: Option<Abi>,
    density: Option<ScreenDensity>,
    language: Option<Language>,
    texture_compression: Option<TextureCompressionFormat>,
}

impl SplitChoice {
    /// A split is installed only when every dimension it pins was chosen with its value
    fn accepts(&self, targeting: &ApkTargeting) -> bool {
        pinned_matches(&targeting.abi, &self.abi)
            && pinned_matches(&targeting.screen_density, &self.density)
            && pinned_matches(&targeting.language, &self.language)
            && pinned_matches(&targeting.texture_compression, &self.texture_compression)
    }
}

fn pinned_matches<T: DimensionValue>(pinned: &Option<Targeted<T>>, chosen: &Option<T>) -> bool {
    match pinned {
        None => true,
        Some(targeted) => chosen.as_ref() == Some(targeted.value()),
    }
}

/// Matches one device against build results
#[derive(Debug, Clone)]
pub struct DeviceMatcher {
    device: DeviceSpec,
}

impl DeviceMatcher {
    pub fn new(device: DeviceSpec) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &DeviceSpec {
        &self.device
    }

    /// Device tier, raised to the lowest tier any variant serves
    fn device_tier(&self, result: &BuildResult) -> DeviceTier {
        let tier = self
            .device
            .device_tier
            .or(result.default_device_tier())
            .unwrap_or_default();
        let lowest = result
            .variants()
            .iter()
            .filter_map(|v| v.targeting().device_tier.as_ref())
            .flat_map(|t| t.covered())
            .min();

        match lowest {
            Some(lowest) if tier < lowest => lowest,
            _ => tier,
        }
    }

    /// Whether every populated dimension of the variant's targeting accepts the device
    pub fn matches_variant(&self, variant: &Variant, tier: DeviceTier) -> bool {
        if (variant.kind() == VariantKind::Instant) != self.device.instant {
            return false;
        }

        let targeting = variant.targeting();
        let sdk_ok = targeting
            .sdk_version
            .as_ref()
            .map_or(true, |sdk| sdk.selects_floor(&self.device.sdk_version));
        let tier_ok = targeting
            .device_tier
            .as_ref()
            .map_or(true, |targeted| targeted.selects_floor(&tier));
        let abi_ok = targeting.abi.as_ref().map_or(true, |abi| self.matches_variant_abi(abi));

        sdk_ok && tier_ok && abi_ok
    }

    /// The device's most preferred ABI among the covered ones must be the variant's own
    ///
    /// A device none of whose ABIs are covered accepts any ABI, so the
    /// highest ranked variant serves it, as master serves it in split variants.
    fn matches_variant_abi(&self, abi: &Targeted<Abi>) -> bool {
        match self.device.supported_abis.iter().find(|candidate| abi.covers(candidate)) {
            Some(preferred) => preferred == abi.value(),
            None => true,
        }
    }

    /// First variant in result order that accepts the device
    pub fn select_variant<'r>(&self, result: &'r BuildResult) -> Result<&'r Variant, MatchError> {
        let tier = self.device_tier(result);
        result
            .variants()
            .iter()
            .find(|variant| self.matches_variant(variant, tier))
            .ok_or(MatchError::NoCompatibleVariant {
                sdk_version: self.device.sdk_version,
            })
    }

    /// Master and matching splits of every module in `variant`, in result order
    pub fn select_apks<'v>(&self, variant: &'v Variant) -> Result<Vec<&'v ApkDescription>, MatchError> {
        let mut selected = Vec::new();
        for apk_set in variant.apk_sets() {
            let choice = self.choose_splits(apk_set)?;
            debug!("Module '{}': {:?}", apk_set.module_name(), choice);
            selected.extend(
                apk_set
                    .apk_descriptions()
                    .iter()
                    .filter(|apk| apk.is_master_split() || choice.accepts(apk.targeting())),
            );
        }
        Ok(selected)
    }

    /// Paths of the APKs the device installs
    pub fn resolve(&self, result: &BuildResult) -> Result<Vec<String>, MatchError> {
        let variant = self.select_variant(result)?;
        let apks = self.select_apks(variant)?;

        info!(
            "Device matched {} variant {} with {} APK(s)",
            variant.kind(),
            variant.variant_number(),
            apks.len()
        );
        Ok(apks.iter().map(|apk| apk.path().to_string()).collect())
    }

    fn choose_splits(&self, apk_set: &ApkSet) -> Result<SplitChoice, MatchError> {
        let module = apk_set.module_name();
        let splits: Vec<&ApkTargeting> = apk_set.splits().map(|apk| apk.targeting()).collect();

        Ok(SplitChoice {
            abi: choose_by_preference(
                module,
                splits.iter().filter_map(|t| t.abi.as_ref()),
                &self.device.supported_abis,
            )?,
            density: self.choose_density(module, splits.iter().filter_map(|t| t.screen_density.as_ref()))?,
            language: choose_language(splits.iter().filter_map(|t| t.language.as_ref()), &self.device.languages),
            texture_compression: choose_by_preference(
                module,
                splits.iter().filter_map(|t| t.texture_compression.as_ref()),
                &self.device.supported_texture_compressions,
            )?,
        })
    }

    /// Exact bucket, otherwise the nearest split bucket
    fn choose_density<'a>(
        &self,
        module: &str,
        targeted: impl Iterator<Item = &'a Targeted<ScreenDensity>>,
    ) -> Result<Option<ScreenDensity>, MatchError> {
        let targeted: Vec<&Targeted<ScreenDensity>> = targeted.collect();
        let bucket = match self.device.density_bucket() {
            Some(bucket) if !targeted.is_empty() => bucket,
            _ => return Ok(None),
        };

        if !targeted.iter().any(|t| t.covers(&bucket)) {
            return Err(incomplete::<ScreenDensity>(module));
        }

        let values: Vec<ScreenDensity> = targeted.iter().map(|t| *t.value()).collect();
        Ok(ScreenDensity::nearest(self.device.screen_density, values.iter()))
    }
}

/// First device preference that a split provides; master when the preference is only covered as an alternative
fn choose_by_preference<'a, T: DimensionValue + 'a>(
    module: &str,
    targeted: impl Iterator<Item = &'a Targeted<T>>,
    preferred: &[T],
) -> Result<Option<T>, MatchError> {
    let targeted: Vec<&Targeted<T>> = targeted.collect();
    if targeted.is_empty() || preferred.is_empty() {
        return Ok(None);
    }

    if let Some(value) = preferred
        .iter()
        .find(|candidate| targeted.iter().any(|t| t.value() == *candidate))
    {
        return Ok(Some(value.clone()));
    }

    if preferred.iter().any(|candidate| targeted.iter().any(|t| t.covers(candidate))) {
        Ok(None)
    } else {
        Err(incomplete::<T>(module))
    }
}

/// Exact language first, then the generic language of a regional preference
fn choose_language<'a>(
    targeted: impl Iterator<Item = &'a Targeted<Language>>,
    preferred: &[Language],
) -> Option<Language> {
    let values: Vec<&Language> = targeted.map(|t| t.value()).collect();

    preferred.iter().find_map(|wanted| {
        values
            .iter()
            .find(|value| **value == wanted)
            .or_else(|| values.iter().find(|value| value.as_str() == wanted.primary()))
            .map(|value| (*value).clone())
    })
}

fn incomplete<T: DimensionValue>(module: &str) -> MatchError {
    MatchError::IncompleteTargeting {
        module: module.to_string(),
        dimension: T::DIMENSION,
    }
}
