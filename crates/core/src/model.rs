//! Build Result Model
//!
//! The tree produced by a build: variants, one APK set per module, and the
//! APKs inside each set. Every record is immutable once constructed; the
//! constructors and the deserializers enforce the structural invariants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::targeting::{ApkTargeting, DeviceTier, VariantTargeting};

/// Family of a variant, decided when the variant is assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// Single self-contained APK for platforms without split support
    Standalone,
    /// Master plus split APKs per module
    Split,
    /// Size-capped split APKs for the instant experience
    Instant,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Standalone => "standalone",
            VariantKind::Split => "split",
            VariantKind::Instant => "instant",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one content entry of the bundle
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryRef {
    pub module: String,
    pub path: String,
}

impl EntryRef {
    pub fn new(module: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            path: path.into(),
        }
    }
}

/// One physical APK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkDescription {
    #[serde(default)]
    targeting: ApkTargeting,
    path: String,
    is_master_split: bool,
    #[serde(default)]
    entries: Vec<EntryRef>,
    #[serde(default)]
    size_bytes: u64,
}

impl ApkDescription {
    pub fn new(targeting: ApkTargeting, path: impl Into<String>, is_master_split: bool) -> Self {
        Self {
            targeting,
            path: path.into(),
            is_master_split,
            entries: Vec::new(),
            size_bytes: 0,
        }
    }

    /// Master APK of a module
    pub fn master(targeting: ApkTargeting, path: impl Into<String>) -> Self {
        Self::new(targeting, path, true)
    }

    /// Non-master split APK
    pub fn split(targeting: ApkTargeting, path: impl Into<String>) -> Self {
        Self::new(targeting, path, false)
    }

    /// Attach content; the size is the sum of the entries' sizes
    pub fn with_entries(mut self, entries: Vec<EntryRef>, size_bytes: u64) -> Self {
        self.entries = entries;
        self.size_bytes = size_bytes;
        self
    }

    pub fn targeting(&self) -> &ApkTargeting {
        &self.targeting
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_master_split(&self) -> bool {
        self.is_master_split
    }

    pub fn entries(&self) -> &[EntryRef] {
        &self.entries
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawApkSet {
    module_name: String,
    apk_descriptions: Vec<ApkDescription>,
}

/// One module's APKs within a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawApkSet")]
pub struct ApkSet {
    module_name: String,
    apk_descriptions: Vec<ApkDescription>,
    #[serde(skip)]
    master_index: usize,
}

impl ApkSet {
    /// Build an APK set; exactly one description must be the master
    pub fn new(module_name: impl Into<String>, apk_descriptions: Vec<ApkDescription>) -> Result<Self, ModelError> {
        let module_name = module_name.into();
        let masters: Vec<usize> = apk_descriptions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_master_split())
            .map(|(index, _)| index)
            .collect();

        match masters.as_slice() {
            [master_index] => Ok(Self {
                module_name,
                apk_descriptions,
                master_index: *master_index,
            }),
            _ => Err(ModelError::MasterCount {
                module: module_name,
                count: masters.len(),
            }),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn apk_descriptions(&self) -> &[ApkDescription] {
        &self.apk_descriptions
    }

    pub fn master(&self) -> &ApkDescription {
        &self.apk_descriptions[self.master_index]
    }

    pub fn splits(&self) -> impl Iterator<Item = &ApkDescription> {
        self.apk_descriptions.iter().filter(|a| !a.is_master_split())
    }

    /// Total size of every APK in the set
    pub fn size_bytes(&self) -> u64 {
        self.apk_descriptions.iter().map(|a| a.size_bytes()).sum()
    }
}

impl TryFrom<RawApkSet> for ApkSet {
    type Error = ModelError;

    fn try_from(raw: RawApkSet) -> Result<Self, Self::Error> {
        ApkSet::new(raw.module_name, raw.apk_descriptions)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariant {
    #[serde(default)]
    variant_number: u32,
    kind: VariantKind,
    #[serde(default)]
    targeting: VariantTargeting,
    apk_sets: Vec<ApkSet>,
}

/// Top-level unit of device-install selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawVariant")]
pub struct Variant {
    variant_number: u32,
    kind: VariantKind,
    targeting: VariantTargeting,
    apk_sets: Vec<ApkSet>,
}

impl Variant {
    /// Single APK holding everything for the variant
    pub fn standalone(targeting: VariantTargeting, apk_set: ApkSet) -> Result<Self, ModelError> {
        Self::with_kind(VariantKind::Standalone, targeting, vec![apk_set])
    }

    /// One APK set per module with master and split APKs
    pub fn split(targeting: VariantTargeting, apk_sets: Vec<ApkSet>) -> Result<Self, ModelError> {
        Self::with_kind(VariantKind::Split, targeting, apk_sets)
    }

    /// Split-shaped variant restricted to the instant experience
    pub fn instant(targeting: VariantTargeting, apk_sets: Vec<ApkSet>) -> Result<Self, ModelError> {
        Self::with_kind(VariantKind::Instant, targeting, apk_sets)
    }

    fn with_kind(kind: VariantKind, targeting: VariantTargeting, apk_sets: Vec<ApkSet>) -> Result<Self, ModelError> {
        if apk_sets.is_empty() {
            return Err(ModelError::EmptyVariant { kind });
        }
        if kind == VariantKind::Standalone {
            let apks: usize = apk_sets.iter().map(|s| s.apk_descriptions().len()).sum();
            if apk_sets.len() != 1 || apks != 1 {
                return Err(ModelError::StandaloneShape {
                    apk_sets: apk_sets.len(),
                    apks,
                });
            }
        }
        Ok(Self {
            variant_number: 0,
            kind,
            targeting,
            apk_sets,
        })
    }

    /// Same variant with its position in the build result
    pub fn with_variant_number(mut self, variant_number: u32) -> Self {
        self.variant_number = variant_number;
        self
    }

    pub fn variant_number(&self) -> u32 {
        self.variant_number
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    pub fn targeting(&self) -> &VariantTargeting {
        &self.targeting
    }

    pub fn apk_sets(&self) -> &[ApkSet] {
        &self.apk_sets
    }

    pub fn apk_set(&self, module_name: &str) -> Option<&ApkSet> {
        self.apk_sets.iter().find(|s| s.module_name() == module_name)
    }
}

impl TryFrom<RawVariant> for Variant {
    type Error = ModelError;

    fn try_from(raw: RawVariant) -> Result<Self, Self::Error> {
        Ok(Variant::with_kind(raw.kind, raw.targeting, raw.apk_sets)?.with_variant_number(raw.variant_number))
    }
}

/// Root of the generated tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    variants: Vec<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_device_tier: Option<DeviceTier>,
}

impl BuildResult {
    pub fn new(variants: Vec<Variant>) -> Self {
        Self {
            variants,
            default_device_tier: None,
        }
    }

    pub fn with_default_device_tier(mut self, tier: DeviceTier) -> Self {
        self.default_device_tier = Some(tier);
        self
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn default_device_tier(&self) -> Option<DeviceTier> {
        self.default_device_tier
    }

    /// Every APK in the tree, in variant / module / APK order
    pub fn apk_descriptions(&self) -> impl Iterator<Item = &ApkDescription> {
        self.variants
            .iter()
            .flat_map(|v| v.apk_sets())
            .flat_map(|s| s.apk_descriptions())
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self, pretty: bool) -> crate::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}
