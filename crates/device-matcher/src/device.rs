//! Device Specification
//!
//! The properties of a concrete device that variant and split selection
//! looks at.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use bundlekit_core::{Abi, DeviceTier, Language, ScreenDensity, SdkVersion, TextureCompressionFormat};

/// Device specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    /// SDK/API level
    pub sdk_version: SdkVersion,
    /// Supported ABIs, most preferred first
    #[serde(default)]
    pub supported_abis: Vec<Abi>,
    /// Screen density in dpi
    #[serde(default = "default_density")]
    pub screen_density: u32,
    /// Languages, most preferred first
    #[serde(default, alias = "supportedLocales")]
    pub languages: Vec<Language>,
    /// Supported texture compression formats, most preferred first
    #[serde(default)]
    pub supported_texture_compressions: Vec<TextureCompressionFormat>,
    /// Device tier; the build result's default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_tier: Option<DeviceTier>,
    /// Request the instant experience instead of an installed app
    #[serde(default)]
    pub instant: bool,
}

fn default_density() -> u32 {
    ScreenDensity::Mdpi.dpi()
}

impl DeviceSpec {
    pub fn new(sdk_version: u32) -> Self {
        Self {
            sdk_version: SdkVersion(sdk_version),
            supported_abis: Vec::new(),
            screen_density: default_density(),
            languages: Vec::new(),
            supported_texture_compressions: Vec::new(),
            device_tier: None,
            instant: false,
        }
    }

    pub fn with_abis(mut self, abis: impl IntoIterator<Item = Abi>) -> Self {
        self.supported_abis = abis.into_iter().collect();
        self
    }

    pub fn with_density(mut self, dpi: u32) -> Self {
        self.screen_density = dpi;
        self
    }

    pub fn with_languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.languages = languages.into_iter().collect();
        self
    }

    pub fn with_texture_compressions(mut self, formats: impl IntoIterator<Item = TextureCompressionFormat>) -> Self {
        self.supported_texture_compressions = formats.into_iter().collect();
        self
    }

    pub fn with_device_tier(mut self, tier: u32) -> Self {
        self.device_tier = Some(DeviceTier(tier));
        self
    }

    pub fn instant(mut self) -> Self {
        self.instant = true;
        self
    }

    /// Density bucket closest to the device's dpi
    pub fn density_bucket(&self) -> Option<ScreenDensity> {
        ScreenDensity::nearest(self.screen_density, ScreenDensity::ALL.iter())
    }

    /// Load a device specification from a JSON file
    pub async fn load(path: &Path) -> bundlekit_core::Result<Self> {
        debug!("Loading device spec from {:?}", path);
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_spec() {
        let json = r#"{
            "sdkVersion": 30,
            "supportedAbis": ["arm64-v8a", "armeabi-v7a"],
            "screenDensity": 420,
            "supportedLocales": ["fr-CA", "en"],
            "supportedTextureCompressions": ["astc", "etc2"]
        }"#;

        let spec: DeviceSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.sdk_version, SdkVersion(30));
        assert_eq!(spec.supported_abis, vec![Abi::Arm64V8a, Abi::ArmeabiV7a]);
        assert_eq!(spec.languages[0].as_str(), "fr-ca");
        assert_eq!(spec.density_bucket(), Some(ScreenDensity::Xxhdpi));
        assert_eq!(spec.device_tier, None);
        assert!(!spec.instant);
    }

    #[test]
    fn test_defaults() {
        let spec: DeviceSpec = serde_json::from_str(r#"{"sdkVersion": 21}"#).unwrap();
        assert_eq!(spec, DeviceSpec::new(21));
        assert_eq!(spec.density_bucket(), Some(ScreenDensity::Mdpi));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        let spec = DeviceSpec::new(28).with_abis([Abi::X86]).with_device_tier(1).instant();
        tokio::fs::write(&path, serde_json::to_string(&spec).unwrap()).await.unwrap();

        assert_eq!(DeviceSpec::load(&path).await.unwrap(), spec);
    }
}
