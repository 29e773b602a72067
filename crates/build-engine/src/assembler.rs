//! Variant Assembler
//!
//! Plans the reachable variant combinations of a bundle, drives the split
//! generator per module and combines the resulting APK sets into an ordered,
//! validated build result.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use bundlekit_core::bundle::BASE_MODULE_NAME;
use bundlekit_core::{
    Abi, ApkDescription, ApkSet, ApkTargeting, Bundle, BuildResult, BuildSettings, DeviceTier, ModuleDelivery,
    SdkVersion, Targeted, Variant, VariantKind, VariantTargeting,
};

use crate::content::{resolve_bundle, ResolvedBundle, ResolvedEntry};
use crate::instant::{plan_instant, InstantPlan};
use crate::naming::{standalone_apk_path, ApkNaming};
use crate::splitter::{entry_refs, SplitGenerator};
use crate::validation::validate_apk_set;
use crate::{BuildError, BuildOutput};

/// One split variant to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCombo {
    pub sdk: SdkVersion,
    pub tier: Option<DeviceTier>,
    /// Appended to split APK names when more than one combination exists
    pub label: Option<String>,
}

/// Variant combinations reachable from the bundle content
#[derive(Debug, Clone)]
pub struct VariantPlan {
    /// SDK floor of the standalone variants, when they are generated
    pub standalone_sdk: Option<SdkVersion>,
    pub standalone_abis: Vec<Option<Abi>>,
    /// Split SDK buckets, ascending
    pub split_buckets: Vec<SdkVersion>,
    /// Tiers targeted by content plus the default tier; empty unless content targets a tier
    pub tiers: Vec<DeviceTier>,
    pub combos: Vec<SplitCombo>,
    pub instant: Option<InstantPlan>,
}

impl VariantPlan {
    /// Every SDK floor a variant of this plan starts at
    fn sdk_space(&self) -> Vec<SdkVersion> {
        self.standalone_sdk
            .into_iter()
            .chain(self.split_buckets.iter().copied())
            .collect()
    }

    pub fn variant_count(&self) -> usize {
        self.standalone_abis.len() + self.combos.len() + usize::from(self.instant.is_some())
    }
}

/// APK sets generated for one module
#[derive(Debug, Clone)]
pub struct ModuleApkSets {
    pub module: String,
    /// One APK set per split combination, in plan order
    pub splits: Vec<ApkSet>,
    pub instant: Option<ApkSet>,
}

/// Assembles the variants of one resolved bundle
#[derive(Debug, Clone)]
pub struct VariantAssembler {
    bundle: Arc<ResolvedBundle>,
    settings: BuildSettings,
}

impl VariantAssembler {
    pub fn new(bundle: Arc<ResolvedBundle>, settings: BuildSettings) -> Self {
        Self { bundle, settings }
    }

    /// Resolve `bundle` and create an assembler for it
    pub fn from_bundle(bundle: &Bundle, settings: BuildSettings) -> Result<Self, BuildError> {
        Ok(Self::new(Arc::new(resolve_bundle(bundle)?), settings))
    }

    pub fn bundle(&self) -> &ResolvedBundle {
        &self.bundle
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Work out which variants the bundle content can reach
    pub fn plan(&self) -> Result<VariantPlan, BuildError> {
        let metadata = &self.bundle.metadata;
        let spaces = &self.bundle.spaces;
        let threshold = SdkVersion(self.settings.standalone_threshold_sdk);
        let lowest = metadata.min_sdk.max(threshold);

        let mut split_buckets = vec![lowest];
        split_buckets.extend(spaces.sdk_floors.iter().copied().filter(|floor| *floor > lowest));

        let tiers: Vec<DeviceTier> = match metadata.device_tiers {
            Some(ref config) if !spaces.targeted_tiers.is_empty() => {
                let mut reachable = spaces.targeted_tiers.clone();
                reachable.insert(config.default_tier);
                reachable.into_iter().collect()
            }
            _ => Vec::new(),
        };

        let combos = split_combos(&split_buckets, &tiers);

        let standalone_sdk =
            (self.settings.generate_standalones && metadata.min_sdk < threshold).then_some(metadata.min_sdk);
        let standalone_abis = match standalone_sdk {
            Some(_) => self.standalone_abis(),
            None => Vec::new(),
        };

        let instant_tier = if tiers.is_empty() {
            None
        } else {
            metadata.default_device_tier()
        };
        let instant = plan_instant(&self.bundle, &self.settings, lowest, instant_tier)?;

        let plan = VariantPlan {
            standalone_sdk,
            standalone_abis,
            split_buckets,
            tiers,
            combos,
            instant,
        };
        info!(
            "Planned {} variant(s): {} split, {} standalone, {} instant",
            plan.variant_count(),
            plan.combos.len(),
            plan.standalone_abis.len(),
            usize::from(plan.instant.is_some())
        );
        Ok(plan)
    }

    /// ABIs the standalone variants are built for; one ABI-less variant when nothing is ABI-targeted
    fn standalone_abis(&self) -> Vec<Option<Abi>> {
        let abis: BTreeSet<Abi> = self
            .bundle
            .modules
            .iter()
            .filter(|m| m.delivery == ModuleDelivery::InstallTime)
            .flat_map(|m| m.entries.iter())
            .filter_map(|e| e.targeting.abi)
            .collect();

        if abis.is_empty() {
            vec![None]
        } else {
            abis.into_iter().map(Some).collect()
        }
    }

    /// Split one module for every split combination and the instant variant
    pub fn generate_module(&self, name: &str, plan: &VariantPlan) -> Result<ModuleApkSets, BuildError> {
        let module = self
            .bundle
            .module(name)
            .ok_or_else(|| BuildError::UnknownModule(name.to_string()))?;
        let generator = SplitGenerator::new(&self.settings, &self.bundle);

        let mut splits = Vec::with_capacity(plan.combos.len());
        for combo in &plan.combos {
            let entries = module.entries_for(combo.sdk, combo.tier);
            splits.push(generator.generate(name, &entries, &ApkNaming::split(combo.label.clone()))?);
        }

        let instant = match plan.instant {
            Some(ref instant) if instant.includes(name) => {
                let entries = module.entries_for(instant.sdk, instant.tier);
                Some(generator.generate(name, &entries, &ApkNaming::Instant)?)
            }
            _ => None,
        };

        debug!("Generated {} APK set(s) for module '{}'", splits.len() + usize::from(instant.is_some()), name);
        Ok(ModuleApkSets {
            module: name.to_string(),
            splits,
            instant,
        })
    }

    /// Flatten install-time content for one ABI into a single APK
    fn standalone_apk_set(&self, abi: Option<Abi>, sdk: SdkVersion) -> Result<ApkSet, BuildError> {
        let metadata = &self.bundle.metadata;
        let tier = metadata.default_device_tier();
        let default_texture = metadata.default_texture_compression;
        let path = standalone_apk_path(abi);

        let mut selected: Vec<(&str, &ResolvedEntry)> = Vec::new();
        for module in self.bundle.modules.iter().filter(|m| m.delivery == ModuleDelivery::InstallTime) {
            for entry in module.entries_for(sdk, tier) {
                let abi_ok = entry.targeting.abi.map_or(true, |own| Some(own) == abi);
                let texture_ok = entry
                    .targeting
                    .texture_compression
                    .map_or(true, |own| Some(own) == default_texture);
                if abi_ok && texture_ok {
                    selected.push((module.name.as_str(), entry));
                }
            }
        }

        let size = selected.iter().map(|(_, entry)| entry.size).sum();
        let refs = entry_refs(selected);
        let apk = ApkDescription::master(ApkTargeting::default(), path).with_entries(refs, size);
        Ok(ApkSet::new(BASE_MODULE_NAME, vec![apk])?)
    }

    /// Combine per-module APK sets into the ordered, validated build result
    ///
    /// `modules` must follow the bundle's module order.
    pub fn assemble(&self, plan: &VariantPlan, modules: Vec<ModuleApkSets>) -> Result<BuildOutput, BuildError> {
        let sdk_space = plan.sdk_space();
        let mut variants = Vec::with_capacity(plan.variant_count());

        for (index, combo) in plan.combos.iter().enumerate() {
            let apk_sets = modules
                .iter()
                .map(|m| {
                    m.splits.get(index).cloned().ok_or_else(|| {
                        BuildError::Task(format!("module '{}' has no APK set for combination {}", m.module, index))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut targeting =
                VariantTargeting::default().with_sdk_version(Targeted::against(combo.sdk, sdk_space.iter().copied()));
            if let Some(tier) = combo.tier {
                targeting = targeting.with_device_tier(Targeted::against(tier, plan.tiers.iter().copied()));
            }
            variants.push(Variant::split(targeting, apk_sets)?);
        }

        if let Some(ref instant) = plan.instant {
            let apk_sets: Vec<ApkSet> = modules.iter().filter_map(|m| m.instant.clone()).collect();
            let mut targeting = VariantTargeting::default()
                .with_sdk_version(Targeted::against(instant.sdk, plan.standalone_sdk.into_iter().chain([instant.sdk])));
            if let Some(tier) = instant.tier {
                targeting = targeting.with_device_tier(Targeted::exact(tier));
            }
            variants.push(Variant::instant(targeting, apk_sets)?);
        }

        if let Some(sdk) = plan.standalone_sdk {
            let abi_space: Vec<Abi> = plan.standalone_abis.iter().flatten().copied().collect();
            for abi in &plan.standalone_abis {
                let apk_set = self.standalone_apk_set(*abi, sdk)?;
                let mut targeting =
                    VariantTargeting::default().with_sdk_version(Targeted::against(sdk, sdk_space.iter().copied()));
                if let Some(abi) = abi {
                    targeting = targeting.with_abi(Targeted::against(*abi, abi_space.iter().copied()));
                }
                variants.push(Variant::standalone(targeting, apk_set)?);
            }
        }

        for variant in &variants {
            for apk_set in variant.apk_sets() {
                validate_apk_set(apk_set, &self.bundle.spaces)?;
            }
        }

        variants.sort_by_key(variant_order);
        let variants: Vec<Variant> = variants
            .into_iter()
            .enumerate()
            .map(|(number, variant)| variant.with_variant_number(number as u32))
            .collect();

        let mut result = BuildResult::new(variants);
        if let Some(tier) = self.bundle.metadata.default_device_tier() {
            result = result.with_default_device_tier(tier);
        }

        let warnings = plan.instant.as_ref().map(|i| i.dropped.clone()).unwrap_or_default();
        info!("Assembled {} variant(s) with {} warning(s)", result.variants().len(), warnings.len());
        Ok(BuildOutput { result, warnings })
    }

    /// Plan, split every module and assemble on the current thread
    pub fn build(&self) -> Result<BuildOutput, BuildError> {
        let plan = self.plan()?;
        let modules = self
            .bundle
            .modules
            .iter()
            .map(|m| self.generate_module(&m.name, &plan))
            .collect::<Result<Vec<_>, _>>()?;
        self.assemble(&plan, modules)
    }
}

/// Cross SDK buckets with tiers, adding a dimension only when it varies
fn split_combos(buckets: &[SdkVersion], tiers: &[DeviceTier]) -> Vec<SplitCombo> {
    let mut combos: Vec<SplitCombo> = buckets
        .iter()
        .map(|sdk| SplitCombo {
            sdk: *sdk,
            tier: None,
            label: (buckets.len() > 1).then(|| format!("sdk{}", sdk.0)),
        })
        .collect();

    if !tiers.is_empty() {
        combos = combos
            .iter()
            .flat_map(|combo| {
                tiers.iter().map(move |tier| {
                    let label = if tiers.len() > 1 {
                        let tier_label = format!("tier{}", tier.0);
                        Some(match combo.label {
                            Some(ref sdk_label) => format!("{}_{}", sdk_label, tier_label),
                            None => tier_label,
                        })
                    } else {
                        combo.label.clone()
                    };
                    SplitCombo {
                        sdk: combo.sdk,
                        tier: Some(*tier),
                        label,
                    }
                })
            })
            .collect();
    }

    combos
}

/// SDK descending, ABI-targeted first by rank, tier descending, then family
fn variant_order(variant: &Variant) -> (Reverse<Option<SdkVersion>>, Reverse<Option<u8>>, Reverse<Option<DeviceTier>>, u8) {
    let targeting = variant.targeting();
    let family = match variant.kind() {
        VariantKind::Split => 0,
        VariantKind::Instant => 1,
        VariantKind::Standalone => 2,
    };
    (
        Reverse(targeting.sdk_floor()),
        Reverse(targeting.abi.as_ref().map(|abi| abi.value().priority())),
        Reverse(targeting.device_tier.as_ref().map(|tier| *tier.value())),
        family,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundlekit_core::results::{
        instant_apk_variants, is_instant_apk_variant, is_split_apk_variant, is_standalone_apk_variant,
        split_variants, standalone_variants,
    };
    use bundlekit_core::{BundleMetadata, BundleModule, ContentEntry, TargetingTag, TextureCompressionFormat};

    const MB: u64 = 1024 * 1024;

    fn build(bundle: Bundle, settings: BuildSettings) -> Result<BuildOutput, BuildError> {
        VariantAssembler::from_bundle(&bundle, settings)?.build()
    }

    fn paths(variant: &Variant) -> Vec<&str> {
        variant
            .apk_sets()
            .iter()
            .flat_map(|s| s.apk_descriptions())
            .map(|a| a.path())
            .collect()
    }

    #[test]
    fn test_master_only_bundle_yields_one_split_variant() {
        let bundle = Bundle::new(BundleMetadata::new(21))
            .with_module(BundleModule::new("base").with_entry(ContentEntry::new("dex/classes.dex", 100)));
        let output = build(bundle, BuildSettings::default()).unwrap();

        let variants = output.result.variants();
        assert_eq!(variants.len(), 1);
        let variant = &variants[0];
        assert!(is_split_apk_variant(variant));
        assert!(!is_standalone_apk_variant(variant));
        assert!(!is_instant_apk_variant(variant));
        assert_eq!(variant.apk_sets().len(), 1);
        assert_eq!(variant.apk_sets()[0].apk_descriptions().len(), 1);
        assert!(variant.apk_sets()[0].master().is_master_split());
        assert_eq!(variant.targeting().sdk_floor(), Some(SdkVersion(21)));
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_low_min_sdk_adds_standalone_variant() {
        let bundle = Bundle::new(BundleMetadata::new(19))
            .with_module(BundleModule::new("base").with_entry(ContentEntry::new("dex/classes.dex", 100)));
        let output = build(bundle, BuildSettings::default()).unwrap();
        let result = &output.result;

        assert_eq!(result.variants().len(), 2);
        assert!(is_split_apk_variant(&result.variants()[0]));
        assert!(is_standalone_apk_variant(&result.variants()[1]));

        let standalones = standalone_variants(result);
        assert_eq!(standalones.len(), 1);
        assert_eq!(standalones[0], &result.variants()[1]);
        assert_eq!(standalones[0].targeting().sdk_floor(), Some(SdkVersion(19)));
        assert_eq!(paths(standalones[0]), vec!["standalones/standalone.apk"]);

        let sdk = standalones[0].targeting().sdk_version.as_ref().unwrap();
        assert!(sdk.alternatives().contains(&SdkVersion(21)));
        assert_eq!(split_variants(result).len(), 1);
    }

    #[test]
    fn test_standalone_disabled() {
        let bundle = Bundle::new(BundleMetadata::new(19))
            .with_module(BundleModule::new("base").with_entry(ContentEntry::new("dex/classes.dex", 100)));
        let settings = BuildSettings {
            generate_standalones: false,
            ..Default::default()
        };
        let output = build(bundle, settings).unwrap();
        assert!(standalone_variants(&output.result).is_empty());
    }

    #[test]
    fn test_standalone_per_abi_flattens_install_time_modules() {
        let metadata =
            BundleMetadata::new(16).with_default_texture_compression(TextureCompressionFormat::Etc1Rgb8);
        let bundle = Bundle::new(metadata)
            .with_module(
                BundleModule::new("base")
                    .with_entry(ContentEntry::new("dex/classes.dex", 10))
                    .with_entry(ContentEntry::new("lib/x86/libgame.so", 4))
                    .with_entry(ContentEntry::new("lib/arm64-v8a/libgame.so", 5))
                    .with_entry(ContentEntry::new("assets/tex#tcf_etc1_rgb8/sky.pkm", 3))
                    .with_entry(ContentEntry::new("assets/tex#tcf_astc/sky.ktx", 2)),
            )
            .with_module(BundleModule::new("feature").with_entry(ContentEntry::new("dex/feature.dex", 7)))
            .with_module(
                BundleModule::new("extras")
                    .on_demand()
                    .with_entry(ContentEntry::new("dex/extras.dex", 9)),
            );
        let output = build(bundle, BuildSettings::default()).unwrap();

        let standalones = standalone_variants(&output.result);
        assert_eq!(standalones.len(), 2);
        assert_eq!(paths(standalones[0]), vec!["standalones/standalone-arm64_v8a.apk"]);
        assert_eq!(paths(standalones[1]), vec!["standalones/standalone-x86.apk"]);

        let apk = standalones[1].apk_sets()[0].master();
        let entries: Vec<(&str, &str)> = apk.entries().iter().map(|e| (e.module.as_str(), e.path.as_str())).collect();
        assert_eq!(
            entries,
            vec![
                ("base", "assets/tex#tcf_etc1_rgb8/sky.pkm"),
                ("base", "dex/classes.dex"),
                ("base", "lib/x86/libgame.so"),
                ("feature", "dex/feature.dex"),
            ]
        );
        assert_eq!(apk.size_bytes(), 24);

        let abi = standalones[1].targeting().abi.as_ref().unwrap();
        assert_eq!(*abi.value(), Abi::X86);
        assert!(abi.alternatives().contains(&Abi::Arm64V8a));
    }

    #[test]
    fn test_split_variant_has_every_module() {
        let bundle = Bundle::new(BundleMetadata::new(21))
            .with_module(
                BundleModule::new("base")
                    .with_entry(ContentEntry::new("dex/classes.dex", 10))
                    .with_entry(ContentEntry::new("lib/x86/libgame.so", 4))
                    .with_entry(ContentEntry::new("lib/arm64-v8a/libgame.so", 5)),
            )
            .with_module(
                BundleModule::new("extras")
                    .on_demand()
                    .with_entry(ContentEntry::new("res/values-fr/strings.xml", 1)),
            );
        let output = build(bundle, BuildSettings::default()).unwrap();
        let variant = &output.result.variants()[0];

        let modules: Vec<&str> = variant.apk_sets().iter().map(|s| s.module_name()).collect();
        assert_eq!(modules, vec!["base", "extras"]);
        assert_eq!(
            paths(variant),
            vec![
                "splits/base-master.apk",
                "splits/base-arm64_v8a.apk",
                "splits/base-x86.apk",
                "splits/extras-master.apk",
                "splits/extras-fr.apk",
            ]
        );
    }

    #[test]
    fn test_sdk_buckets_from_content_floors() {
        let bundle = Bundle::new(BundleMetadata::new(21)).with_module(
            BundleModule::new("base")
                .with_entry(ContentEntry::new("dex/classes.dex", 10))
                .with_entry(ContentEntry::new("lib/x86/libgame.so", 4).with_tag(TargetingTag::new("sdk", "26")))
                .with_entry(ContentEntry::new("lib/x86/libgame.so", 3)),
        );
        let output = build(bundle, BuildSettings::default()).unwrap();
        let variants = output.result.variants();

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].targeting().sdk_floor(), Some(SdkVersion(26)));
        assert_eq!(variants[1].targeting().sdk_floor(), Some(SdkVersion(21)));
        assert_eq!(variants[0].variant_number(), 0);
        assert_eq!(variants[1].variant_number(), 1);
        assert!(paths(&variants[0]).contains(&"splits/base-x86_sdk26.apk"));

        let x86 = variants[0].apk_sets()[0].splits().next().unwrap();
        assert_eq!(x86.size_bytes(), 4);
        let x86 = variants[1].apk_sets()[0].splits().next().unwrap();
        assert_eq!(x86.size_bytes(), 3);

        let sdk = variants[1].targeting().sdk_version.as_ref().unwrap();
        assert!(sdk.selects_floor(&SdkVersion(25)));
        assert!(!sdk.selects_floor(&SdkVersion(26)));
    }

    #[test]
    fn test_tier_variants_only_when_content_targets_tiers() {
        let metadata = BundleMetadata::new(21).with_device_tiers([0, 1], 0);
        let untiered = Bundle::new(metadata.clone())
            .with_module(BundleModule::new("base").with_entry(ContentEntry::new("dex/classes.dex", 10)));
        let output = build(untiered, BuildSettings::default()).unwrap();
        assert_eq!(output.result.variants().len(), 1);
        assert_eq!(output.result.default_device_tier(), Some(DeviceTier(0)));

        let tiered = Bundle::new(metadata).with_module(
            BundleModule::new("base")
                .with_entry(ContentEntry::new("dex/classes.dex", 10))
                .with_entry(ContentEntry::new("assets/models#tier_1/hero.bin", 8))
                .with_entry(ContentEntry::new("assets/models#tier_0/hero.bin", 2)),
        );
        let output = build(tiered, BuildSettings::default()).unwrap();
        let variants = output.result.variants();
        assert_eq!(variants.len(), 2);

        let tiers: Vec<u32> = variants
            .iter()
            .map(|v| v.targeting().device_tier.as_ref().unwrap().value().0)
            .collect();
        assert_eq!(tiers, vec![1, 0]);
        assert_eq!(paths(&variants[0]), vec!["splits/base-master_tier1.apk"]);
        assert_eq!(variants[0].apk_sets()[0].master().size_bytes(), 18);
        assert_eq!(variants[1].apk_sets()[0].master().size_bytes(), 12);
    }

    #[test]
    fn test_untargeted_declared_tier_gets_no_variant() {
        let metadata = BundleMetadata::new(21).with_device_tiers([0, 1, 2], 0);
        let bundle = Bundle::new(metadata).with_module(
            BundleModule::new("base")
                .with_entry(ContentEntry::new("dex/classes.dex", 10))
                .with_entry(ContentEntry::new("assets/models#tier_1/hero.bin", 8)),
        );
        let output = build(bundle, BuildSettings::default()).unwrap();
        let variants = output.result.variants();
        assert_eq!(variants.len(), 2);

        let tier1 = variants[0].targeting().device_tier.as_ref().unwrap();
        assert_eq!(*tier1.value(), DeviceTier(1));
        assert!(tier1.selects_floor(&DeviceTier(2)));
        let tier0 = variants[1].targeting().device_tier.as_ref().unwrap();
        assert_eq!(*tier0.value(), DeviceTier(0));
        assert!(!tier0.selects_floor(&DeviceTier(2)));

        assert_eq!(variants[0].apk_sets()[0].master().size_bytes(), 18);
        assert_eq!(variants[1].apk_sets()[0].master().size_bytes(), 10);
    }

    #[test]
    fn test_instant_variant_drops_oversized_module() {
        let metadata = BundleMetadata::new(21).with_instant_module("base").with_instant_module("feature");
        let bundle = Bundle::new(metadata)
            .with_module(BundleModule::new("base").with_entry(ContentEntry::new("dex/classes.dex", 2 * MB)))
            .with_module(BundleModule::new("feature").with_entry(ContentEntry::new("dex/classes.dex", 6 * MB)));
        let settings = BuildSettings {
            instant_size_limit: 5 * MB,
            ..Default::default()
        };
        let output = build(bundle, settings).unwrap();

        let instant = instant_apk_variants(&output.result);
        assert_eq!(instant.len(), 1);
        let modules: Vec<&str> = instant[0].apk_sets().iter().map(|s| s.module_name()).collect();
        assert_eq!(modules, vec!["base"]);
        assert_eq!(paths(instant[0]), vec!["instant/instant-base-master.apk"]);

        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].module(), Some("feature"));

        let split = &split_variants(&output.result)[0];
        assert_eq!(split.apk_sets().len(), 2);
    }

    #[test]
    fn test_instant_without_entry_module_fails() {
        let metadata = BundleMetadata::new(21).with_instant_module("base");
        let bundle = Bundle::new(metadata)
            .with_module(BundleModule::new("base").with_entry(ContentEntry::new("dex/classes.dex", 6 * MB)));
        let settings = BuildSettings {
            instant_size_limit: 5 * MB,
            ..Default::default()
        };
        assert!(matches!(build(bundle, settings), Err(BuildError::InstantVariantEmpty(_))));
    }

    #[test]
    fn test_families_partition_the_result() {
        let metadata = BundleMetadata::new(19).with_instant_module("base");
        let bundle = Bundle::new(metadata).with_module(
            BundleModule::new("base")
                .with_entry(ContentEntry::new("dex/classes.dex", 10))
                .with_entry(ContentEntry::new("lib/x86/libgame.so", 4))
                .with_entry(ContentEntry::new("lib/mips/libgame.so", 4)),
        );
        let output = build(bundle, BuildSettings::default()).unwrap();
        let result = &output.result;

        for variant in result.variants() {
            let families = [
                is_standalone_apk_variant(variant),
                is_split_apk_variant(variant),
                is_instant_apk_variant(variant),
            ];
            assert_eq!(families.iter().filter(|f| **f).count(), 1);
        }

        let total = standalone_variants(result).len() + split_variants(result).len() + instant_apk_variants(result).len();
        assert_eq!(total, result.variants().len());

        let kinds: Vec<VariantKind> = result.variants().iter().map(|v| v.kind()).collect();
        assert_eq!(
            kinds,
            vec![VariantKind::Split, VariantKind::Instant, VariantKind::Standalone, VariantKind::Standalone]
        );
        let standalone_abis: Vec<Abi> = standalone_variants(result)
            .iter()
            .map(|v| *v.targeting().abi.as_ref().unwrap().value())
            .collect();
        assert_eq!(standalone_abis, vec![Abi::X86, Abi::Mips]);
    }

    #[test]
    fn test_malformed_entry_aborts_build() {
        let bundle = Bundle::new(BundleMetadata::new(21)).with_module(
            BundleModule::new("feature").with_entry(ContentEntry::new("lib/sparc/libgame.so", 1)),
        );
        let err = build(bundle, BuildSettings::default()).unwrap_err();
        assert_eq!(err.module(), Some("feature"));
    }

    #[test]
    fn test_same_path_language_variants_rejected_regardless_of_min_sdk() {
        for min_sdk in [19, 21] {
            let bundle = Bundle::new(BundleMetadata::new(min_sdk)).with_module(
                BundleModule::new("base")
                    .with_entry(ContentEntry::new("assets/strings.txt", 1).with_tag(TargetingTag::new("language", "fr")))
                    .with_entry(ContentEntry::new("assets/strings.txt", 1).with_tag(TargetingTag::new("language", "de"))),
            );
            let err = build(bundle, BuildSettings::default()).unwrap_err();
            assert!(matches!(err, BuildError::MalformedTargeting { .. }), "min sdk {}", min_sdk);
        }
    }

    #[test]
    fn test_split_combos_labels() {
        let combos = split_combos(&[SdkVersion(21), SdkVersion(26)], &[DeviceTier(0), DeviceTier(2)]);
        let labels: Vec<Option<&str>> = combos.iter().map(|c| c.label.as_deref()).collect();
        assert_eq!(
            labels,
            vec![Some("sdk21_tier0"), Some("sdk21_tier2"), Some("sdk26_tier0"), Some("sdk26_tier2")]
        );

        let combos = split_combos(&[SdkVersion(21)], &[DeviceTier(1)]);
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].label, None);
        assert_eq!(combos[0].tier, Some(DeviceTier(1)));
    }
}
