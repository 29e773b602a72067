//! Content Resolution
//!
//! Turns the raw targeting tags of every bundle entry into typed targeting,
//! filling untagged dimensions from conventional bundle paths, and collects
//! the value spaces observed across the bundle.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use bundlekit_core::{
    Abi, Bundle, BundleMetadata, ContentEntry, DeviceTier, Dimension, Language, ModuleDelivery,
    ScreenDensity, SdkVersion, TargetingError, TextureCompressionFormat,
};

use crate::BuildError;

static LIB_ABI_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^lib/([^/]+)/").expect("valid regex"));

static ASSET_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(tcf|lang|tier)_([^#/]+)").expect("valid regex"));

static RES_QUALIFIERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^res/[a-z]+-([^/]+)/").expect("valid regex"));

static RES_REGION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^r[A-Za-z]{2}$").expect("valid regex"));

/// Short resource qualifiers that are not language codes
const NON_LOCALE_QUALIFIERS: [&str; 2] = ["car", "hdr"];

/// A single typed targeting value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Abi(Abi),
    Density(ScreenDensity),
    Language(Language),
    TextureCompression(TextureCompressionFormat),
    Sdk(SdkVersion),
    DeviceTier(DeviceTier),
}

impl TagValue {
    /// Parse a raw value of `dimension`; tiers must be declared by the bundle
    pub fn parse(dimension: Dimension, raw: &str, metadata: &BundleMetadata) -> Result<Self, TargetingError> {
        let value = match dimension {
            Dimension::Abi => TagValue::Abi(raw.parse()?),
            Dimension::Density => TagValue::Density(raw.parse()?),
            Dimension::Language => TagValue::Language(raw.parse()?),
            Dimension::TextureCompression => TagValue::TextureCompression(raw.parse()?),
            Dimension::Sdk => TagValue::Sdk(raw.parse()?),
            Dimension::DeviceTier => {
                let tier: DeviceTier = raw.parse()?;
                let declared = metadata
                    .device_tiers
                    .as_ref()
                    .map(|t| t.tiers.contains(&tier))
                    .unwrap_or(false);
                if !declared {
                    return Err(TargetingError::UnknownValue {
                        dimension,
                        value: raw.to_string(),
                    });
                }
                TagValue::DeviceTier(tier)
            }
        };
        Ok(value)
    }

}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Abi(v) => v.fmt(f),
            TagValue::Density(v) => v.fmt(f),
            TagValue::Language(v) => v.fmt(f),
            TagValue::TextureCompression(v) => v.fmt(f),
            TagValue::Sdk(v) => v.fmt(f),
            TagValue::DeviceTier(v) => v.fmt(f),
        }
    }
}

/// Typed targeting of one entry; `None` means untargeted
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryTargeting {
    pub abi: Option<Abi>,
    pub density: Option<ScreenDensity>,
    pub language: Option<Language>,
    pub texture_compression: Option<TextureCompressionFormat>,
    pub sdk: Option<SdkVersion>,
    pub device_tier: Option<DeviceTier>,
}

impl EntryTargeting {
    pub fn get(&self, dimension: Dimension) -> Option<TagValue> {
        match dimension {
            Dimension::Abi => self.abi.map(TagValue::Abi),
            Dimension::Density => self.density.map(TagValue::Density),
            Dimension::Language => self.language.clone().map(TagValue::Language),
            Dimension::TextureCompression => self.texture_compression.map(TagValue::TextureCompression),
            Dimension::Sdk => self.sdk.map(TagValue::Sdk),
            Dimension::DeviceTier => self.device_tier.map(TagValue::DeviceTier),
        }
    }

    fn set(&mut self, value: TagValue) {
        match value {
            TagValue::Abi(v) => self.abi = Some(v),
            TagValue::Density(v) => self.density = Some(v),
            TagValue::Language(v) => self.language = Some(v),
            TagValue::TextureCompression(v) => self.texture_compression = Some(v),
            TagValue::Sdk(v) => self.sdk = Some(v),
            TagValue::DeviceTier(v) => self.device_tier = Some(v),
        }
    }

    /// Only the dimensions that place an entry in a split APK
    pub fn split_only(&self) -> Self {
        Self {
            sdk: None,
            device_tier: None,
            ..self.clone()
        }
    }

    /// Same targeting with the SDK floor removed
    pub fn without_sdk(&self) -> Self {
        Self {
            sdk: None,
            ..self.clone()
        }
    }

    /// Whether the entry belongs in a variant of the given SDK bucket and tier
    pub fn applies_to(&self, sdk: SdkVersion, tier: Option<DeviceTier>) -> bool {
        let sdk_ok = self.sdk.map(|floor| floor <= sdk).unwrap_or(true);
        let tier_ok = match (self.device_tier, tier) {
            (None, _) => true,
            (Some(own), Some(wanted)) => own == wanted,
            (Some(_), None) => false,
        };
        sdk_ok && tier_ok
    }
}

/// Entry with typed targeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub path: String,
    pub size: u64,
    pub targeting: EntryTargeting,
}

/// Module with typed entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub name: String,
    pub delivery: ModuleDelivery,
    pub entries: Vec<ResolvedEntry>,
}

impl ResolvedModule {
    /// Entries for a variant bucket; for one path only the highest applicable SDK floor is kept
    pub fn entries_for(&self, sdk: SdkVersion, tier: Option<DeviceTier>) -> Vec<&ResolvedEntry> {
        let mut best: BTreeMap<(&str, EntryTargeting), &ResolvedEntry> = BTreeMap::new();
        for entry in self.entries.iter().filter(|e| e.targeting.applies_to(sdk, tier)) {
            let key = (entry.path.as_str(), entry.targeting.without_sdk());
            match best.get(&key) {
                Some(current) if current.targeting.sdk >= entry.targeting.sdk => {}
                _ => {
                    best.insert(key, entry);
                }
            }
        }
        best.into_values().collect()
    }
}

/// Values observed across the whole bundle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSpaces {
    pub abis: BTreeSet<Abi>,
    pub densities: BTreeSet<ScreenDensity>,
    /// Language space of the build: observed plus declared alternatives
    pub languages: BTreeSet<Language>,
    pub texture_formats: BTreeSet<TextureCompressionFormat>,
    pub sdk_floors: BTreeSet<SdkVersion>,
    /// Tiers actually targeted by content
    pub targeted_tiers: BTreeSet<DeviceTier>,
}

impl ValueSpaces {
    fn record(&mut self, targeting: &EntryTargeting) {
        if let Some(abi) = targeting.abi {
            self.abis.insert(abi);
        }
        if let Some(density) = targeting.density {
            self.densities.insert(density);
        }
        if let Some(ref language) = targeting.language {
            self.languages.insert(language.clone());
        }
        if let Some(tcf) = targeting.texture_compression {
            self.texture_formats.insert(tcf);
        }
        if let Some(sdk) = targeting.sdk {
            self.sdk_floors.insert(sdk);
        }
        if let Some(tier) = targeting.device_tier {
            self.targeted_tiers.insert(tier);
        }
    }
}

/// The bundle with every entry's targeting resolved
#[derive(Debug, Clone)]
pub struct ResolvedBundle {
    pub modules: Vec<ResolvedModule>,
    pub metadata: BundleMetadata,
    pub spaces: ValueSpaces,
}

impl ResolvedBundle {
    pub fn module(&self, name: &str) -> Option<&ResolvedModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// Targeting a path implies by bundle layout conventions
pub fn path_targeting(path: &str) -> Vec<(Dimension, String)> {
    let mut found = Vec::new();

    if let Some(caps) = LIB_ABI_DIR.captures(path) {
        found.push((Dimension::Abi, caps[1].to_string()));
    }

    if path.starts_with("assets/") {
        for caps in ASSET_SUFFIX.captures_iter(path) {
            let dimension = match &caps[1] {
                "tcf" => Dimension::TextureCompression,
                "lang" => Dimension::Language,
                _ => Dimension::DeviceTier,
            };
            found.push((dimension, caps[2].to_string()));
        }
    }

    if let Some(caps) = RES_QUALIFIERS.captures(path) {
        found.extend(resource_qualifier_targeting(&caps[1]));
    }

    found
}

fn resource_qualifier_targeting(qualifiers: &str) -> Vec<(Dimension, String)> {
    let mut found = Vec::new();
    let parts: Vec<&str> = qualifiers
        .split('-')
        .skip_while(|q| q.starts_with("mcc") || q.starts_with("mnc"))
        .collect();

    // Android puts the locale first after mcc/mnc
    if let Some(first) = parts.first() {
        if let Some(bcp47) = first.strip_prefix("b+") {
            found.push((Dimension::Language, bcp47.replace('+', "-")));
        } else if (2..=3).contains(&first.len())
            && first.chars().all(|c| c.is_ascii_lowercase())
            && !NON_LOCALE_QUALIFIERS.contains(first)
        {
            let language = match parts.get(1) {
                Some(region) if RES_REGION.is_match(region) => format!("{}-{}", first, &region[1..]),
                _ => first.to_string(),
            };
            found.push((Dimension::Language, language));
        }
    }

    if let Some(density) = parts.iter().find(|q| q.parse::<ScreenDensity>().is_ok() && q.ends_with("dpi")) {
        found.push((Dimension::Density, density.to_string()));
    }

    found
}

fn malformed(module: &str, path: &str, reason: impl fmt::Display) -> BuildError {
    BuildError::MalformedTargeting {
        module: module.to_string(),
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Declared alternatives per targeted value within one module
type DeclaredAlternatives = BTreeMap<(Dimension, String), (String, BTreeSet<String>)>;

fn resolve_entry(
    module: &str,
    entry: &ContentEntry,
    metadata: &BundleMetadata,
    declared: &mut DeclaredAlternatives,
    extra_languages: &mut BTreeSet<Language>,
) -> Result<ResolvedEntry, BuildError> {
    let mut targeting = EntryTargeting::default();
    let mut explicit: BTreeSet<Dimension> = BTreeSet::new();

    for tag in &entry.targeting {
        let dimension: Dimension = tag.dimension.parse().map_err(|e| malformed(module, &entry.path, e))?;
        let value = TagValue::parse(dimension, &tag.value, metadata).map_err(|e| malformed(module, &entry.path, e))?;

        if let Some(previous) = targeting.get(dimension) {
            if previous != value {
                return Err(malformed(
                    module,
                    &entry.path,
                    format!("tagged with both {} and {} for {}", previous, value, dimension),
                ));
            }
        }

        let mut alternatives = BTreeSet::new();
        for raw in &tag.alternatives {
            let alternative =
                TagValue::parse(dimension, raw, metadata).map_err(|e| malformed(module, &entry.path, e))?;
            if alternative == value {
                return Err(malformed(
                    module,
                    &entry.path,
                    TargetingError::ValueInAlternatives {
                        dimension,
                        value: value.to_string(),
                    },
                ));
            }
            if let TagValue::Language(ref language) = alternative {
                extra_languages.insert(language.clone());
            }
            alternatives.insert(alternative.to_string());
        }

        if !alternatives.is_empty() {
            let key = (dimension, value.to_string());
            match declared.get(&key) {
                Some((first_path, existing)) if *existing != alternatives => {
                    return Err(malformed(
                        module,
                        &entry.path,
                        format!(
                            "alternatives for {} '{}' differ from those declared by '{}'",
                            dimension, value, first_path
                        ),
                    ));
                }
                Some(_) => {}
                None => {
                    declared.insert(key, (entry.path.clone(), alternatives));
                }
            }
        }

        explicit.insert(dimension);
        targeting.set(value);
    }

    for (dimension, raw) in path_targeting(&entry.path) {
        if explicit.contains(&dimension) {
            continue;
        }
        let value = TagValue::parse(dimension, &raw, metadata).map_err(|e| malformed(module, &entry.path, e))?;
        targeting.set(value);
    }

    Ok(ResolvedEntry {
        path: entry.path.clone(),
        size: entry.size,
        targeting,
    })
}

/// Every declared alternative set must name each sibling value the module targets
fn check_declared_alternatives(
    module: &str,
    entries: &[ResolvedEntry],
    declared: &DeclaredAlternatives,
) -> Result<(), BuildError> {
    for ((dimension, value), (path, alternatives)) in declared {
        let siblings: BTreeSet<String> = entries
            .iter()
            .filter_map(|e| e.targeting.get(*dimension))
            .map(|v| v.to_string())
            .filter(|v| v != value)
            .collect();

        if let Some(missing) = siblings.iter().find(|s| !alternatives.contains(*s)) {
            return Err(malformed(
                module,
                path,
                format!(
                    "{} '{}' declares alternatives that omit sibling value '{}'",
                    dimension, value, missing
                ),
            ));
        }
    }
    Ok(())
}

/// Resolve the targeting of every entry in the bundle
pub fn resolve_bundle(bundle: &Bundle) -> Result<ResolvedBundle, BuildError> {
    let metadata = &bundle.metadata;

    if let Some(ref tiers) = metadata.device_tiers {
        if !tiers.tiers.contains(&tiers.default_tier) {
            return Err(BuildError::Config(format!(
                "default device tier {} is not among the declared tiers",
                tiers.default_tier
            )));
        }
    }

    let mut seen_modules = HashSet::new();
    for module in &bundle.modules {
        if !seen_modules.insert(module.name.as_str()) {
            return Err(BuildError::DuplicateModule(module.name.clone()));
        }
    }
    if let Some(unknown) = metadata.instant_modules.iter().find(|m| !seen_modules.contains(m.as_str())) {
        return Err(BuildError::UnknownModule(unknown.clone()));
    }

    let mut spaces = ValueSpaces::default();
    let mut modules = Vec::with_capacity(bundle.modules.len());

    for module in bundle.ordered_modules() {
        let mut declared = DeclaredAlternatives::new();
        let mut extra_languages = BTreeSet::new();
        let mut entries = Vec::with_capacity(module.entries.len());
        let mut seen: HashSet<(String, EntryTargeting)> = HashSet::new();
        let mut split_targeting: HashMap<String, EntryTargeting> = HashMap::new();

        for entry in &module.entries {
            let resolved = resolve_entry(&module.name, entry, metadata, &mut declared, &mut extra_languages)?;
            if !seen.insert((resolved.path.clone(), resolved.targeting.clone())) {
                return Err(malformed(&module.name, &entry.path, "duplicate entry with identical targeting"));
            }
            // One path is one file of the module; only SDK floors and tiers may vary it
            let split_only = resolved.targeting.split_only();
            match split_targeting.get(&resolved.path) {
                Some(existing) if *existing != split_only => {
                    return Err(malformed(
                        &module.name,
                        &entry.path,
                        "same path tagged with different split targeting",
                    ));
                }
                Some(_) => {}
                None => {
                    split_targeting.insert(resolved.path.clone(), split_only);
                }
            }
            spaces.record(&resolved.targeting);
            entries.push(resolved);
        }

        check_declared_alternatives(&module.name, &entries, &declared)?;
        spaces.languages.extend(extra_languages);

        debug!("Resolved module '{}' with {} entries", module.name, entries.len());
        modules.push(ResolvedModule {
            name: module.name.clone(),
            delivery: module.delivery,
            entries,
        });
    }

    Ok(ResolvedBundle {
        modules,
        metadata: metadata.clone(),
        spaces,
    })
}
