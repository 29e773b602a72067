//! Bundle input descriptors
//!
//! The pre-loaded view of an app bundle handed to the build engine by the
//! bundle reader: modules, their content entries with raw targeting tags, and
//! bundle-level metadata.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::targeting::{DeviceTier, SdkVersion, TextureCompressionFormat};

/// Name of the entry module every bundle is built around
pub const BASE_MODULE_NAME: &str = "base";

/// How a module reaches the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleDelivery {
    /// Installed together with the base module
    #[default]
    InstallTime,
    /// Downloaded later on request
    OnDemand,
}

/// Raw targeting tag as written by the bundle reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetingTag {
    pub dimension: String,
    pub value: String,
    /// Sibling values the bundle declares for this tag
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

impl TargetingTag {
    pub fn new(dimension: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            value: value.into(),
            alternatives: Vec::new(),
        }
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }
}

/// One file of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Path relative to the module root
    pub path: String,
    /// Compressed size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub targeting: Vec<TargetingTag>,
}

impl ContentEntry {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            targeting: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: TargetingTag) -> Self {
        self.targeting.push(tag);
        self
    }
}

/// A deliverable unit of the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleModule {
    pub name: String,
    #[serde(default)]
    pub delivery: ModuleDelivery,
    #[serde(default)]
    pub entries: Vec<ContentEntry>,
}

impl BundleModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delivery: ModuleDelivery::InstallTime,
            entries: Vec::new(),
        }
    }

    pub fn on_demand(mut self) -> Self {
        self.delivery = ModuleDelivery::OnDemand;
        self
    }

    pub fn with_entry(mut self, entry: ContentEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn is_base(&self) -> bool {
        self.name == BASE_MODULE_NAME
    }

    /// Sum of the compressed sizes of every entry
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Device tiers declared by the bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTierConfig {
    pub tiers: BTreeSet<DeviceTier>,
    #[serde(default)]
    pub default_tier: DeviceTier,
}

/// Bundle-level metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub min_sdk: SdkVersion,
    #[serde(default)]
    pub instant_modules: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_tiers: Option<DeviceTierConfig>,
    /// Texture format served to devices that cannot take split APKs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_texture_compression: Option<TextureCompressionFormat>,
}

impl BundleMetadata {
    pub fn new(min_sdk: u32) -> Self {
        Self {
            min_sdk: SdkVersion(min_sdk),
            instant_modules: BTreeSet::new(),
            device_tiers: None,
            default_texture_compression: None,
        }
    }

    pub fn with_instant_module(mut self, name: impl Into<String>) -> Self {
        self.instant_modules.insert(name.into());
        self
    }

    pub fn with_device_tiers(mut self, tiers: impl IntoIterator<Item = u32>, default_tier: u32) -> Self {
        self.device_tiers = Some(DeviceTierConfig {
            tiers: tiers.into_iter().map(DeviceTier).collect(),
            default_tier: DeviceTier(default_tier),
        });
        self
    }

    pub fn with_default_texture_compression(mut self, format: TextureCompressionFormat) -> Self {
        self.default_texture_compression = Some(format);
        self
    }

    pub fn is_instant(&self, module: &str) -> bool {
        self.instant_modules.contains(module)
    }

    /// Tier assumed for devices and content without an explicit tier
    pub fn default_device_tier(&self) -> Option<DeviceTier> {
        self.device_tiers.as_ref().map(|t| t.default_tier)
    }
}

/// The whole pre-loaded bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub modules: Vec<BundleModule>,
    pub metadata: BundleMetadata,
}

impl Bundle {
    pub fn new(metadata: BundleMetadata) -> Self {
        Self {
            modules: Vec::new(),
            metadata,
        }
    }

    pub fn with_module(mut self, module: BundleModule) -> Self {
        self.modules.push(module);
        self
    }

    pub fn module(&self, name: &str) -> Option<&BundleModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Modules with the base module first, the rest by name
    pub fn ordered_modules(&self) -> Vec<&BundleModule> {
        let mut modules: Vec<&BundleModule> = self.modules.iter().collect();
        modules.sort_by(|a, b| b.is_base().cmp(&a.is_base()).then_with(|| a.name.cmp(&b.name)));
        modules
    }

    /// Load a bundle descriptor from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading bundle descriptor from {:?}", path);
        let contents = tokio::fs::read_to_string(path).await?;
        let bundle: Bundle = serde_json::from_str(&contents)?;
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_modules_put_base_first() {
        let bundle = Bundle::new(BundleMetadata::new(21))
            .with_module(BundleModule::new("feature"))
            .with_module(BundleModule::new("assets"))
            .with_module(BundleModule::new("base"));

        let names: Vec<&str> = bundle.ordered_modules().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["base", "assets", "feature"]);
    }

    #[test]
    fn test_parse_descriptor() {
        let json = r#"{
            "modules": [{
                "name": "base",
                "entries": [
                    {"path": "dex/classes.dex", "size": 2048},
                    {"path": "lib/x86/libgame.so", "size": 512,
                     "targeting": [{"dimension": "abi", "value": "x86"}]}
                ]
            }, {
                "name": "maps",
                "delivery": "on_demand"
            }],
            "metadata": {"min_sdk": 19, "instant_modules": ["base"]}
        }"#;

        let bundle: Bundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.metadata.min_sdk, SdkVersion(19));
        assert!(bundle.metadata.is_instant("base"));
        assert_eq!(bundle.module("base").unwrap().total_size(), 2560);
        assert_eq!(bundle.module("maps").unwrap().delivery, ModuleDelivery::OnDemand);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let bundle = Bundle::new(BundleMetadata::new(21)).with_module(BundleModule::new("base"));
        std::fs::write(&path, serde_json::to_string(&bundle).unwrap()).unwrap();

        let loaded = Bundle::load(&path).await.unwrap();
        assert_eq!(loaded, bundle);
    }
}
