//! Targeting Model
//!
//! Value types for each targeting dimension and the composite targeting
//! records attached to APKs and variants.
//!
//! Every split dimension except language has a closed value space, so the
//! alternatives of a split can always be computed as "the space minus my value".

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TargetingError;

/// Axis along which bundle content is partitioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Abi,
    Density,
    Language,
    TextureCompression,
    Sdk,
    DeviceTier,
}

impl Dimension {
    /// Dimensions that partition a module into split APKs, in split-name order
    pub const SPLIT_DIMENSIONS: [Dimension; 4] = [
        Dimension::Abi,
        Dimension::Density,
        Dimension::Language,
        Dimension::TextureCompression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Abi => "abi",
            Dimension::Density => "density",
            Dimension::Language => "language",
            Dimension::TextureCompression => "texture_compression",
            Dimension::Sdk => "sdk",
            Dimension::DeviceTier => "device_tier",
        }
    }

    /// Whether content targeted on this dimension goes into a split APK
    pub fn is_split_dimension(&self) -> bool {
        Self::SPLIT_DIMENSIONS.contains(self)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abi" => Ok(Dimension::Abi),
            "density" | "screen_density" => Ok(Dimension::Density),
            "language" => Ok(Dimension::Language),
            "texture_compression" | "tcf" => Ok(Dimension::TextureCompression),
            "sdk" | "sdk_version" => Ok(Dimension::Sdk),
            "device_tier" | "tier" => Ok(Dimension::DeviceTier),
            _ => Err(TargetingError::UnknownDimension(s.to_string())),
        }
    }
}

/// A value of one targeting dimension
pub trait DimensionValue: Clone + Ord + fmt::Display + 'static {
    /// Dimension this value belongs to
    const DIMENSION: Dimension;

    /// Every value the dimension can take, if that set is fixed
    fn closed_space() -> Option<&'static [Self]>;

    /// The closed space, or the `observed` values for an open dimension
    fn value_space<'a>(observed: impl IntoIterator<Item = &'a Self>) -> BTreeSet<Self>
    where
        Self: 'a,
    {
        match Self::closed_space() {
            Some(space) => space.iter().cloned().collect(),
            None => observed.into_iter().cloned().collect(),
        }
    }
}

/// Native ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Abi {
    #[serde(rename = "armeabi")]
    Armeabi,
    #[serde(rename = "armeabi-v7a")]
    ArmeabiV7a,
    #[serde(rename = "arm64-v8a")]
    Arm64V8a,
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "mips")]
    Mips,
    #[serde(rename = "mips64")]
    Mips64,
    #[serde(rename = "riscv64")]
    Riscv64,
}

impl Abi {
    pub const ALL: [Abi; 8] = [
        Abi::Armeabi,
        Abi::ArmeabiV7a,
        Abi::Arm64V8a,
        Abi::X86,
        Abi::X86_64,
        Abi::Mips,
        Abi::Mips64,
        Abi::Riscv64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Abi::Armeabi => "armeabi",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::Arm64V8a => "arm64-v8a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
            Abi::Mips => "mips",
            Abi::Mips64 => "mips64",
            Abi::Riscv64 => "riscv64",
        }
    }

    /// Ordering weight used when several ABI variants compete: 64-bit first
    pub fn priority(&self) -> u8 {
        match self {
            Abi::Arm64V8a => 7,
            Abi::X86_64 => 6,
            Abi::Riscv64 => 5,
            Abi::Mips64 => 4,
            Abi::ArmeabiV7a => 3,
            Abi::X86 => 2,
            Abi::Armeabi => 1,
            Abi::Mips => 0,
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Abi {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Abi::ALL
            .iter()
            .copied()
            .find(|abi| abi.as_str().replace('_', "-") == normalized)
            .ok_or_else(|| TargetingError::UnknownValue {
                dimension: Dimension::Abi,
                value: s.to_string(),
            })
    }
}

impl DimensionValue for Abi {
    const DIMENSION: Dimension = Dimension::Abi;

    fn closed_space() -> Option<&'static [Self]> {
        Some(&Self::ALL)
    }
}

/// Screen density bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenDensity {
    Ldpi,
    Mdpi,
    Tvdpi,
    Hdpi,
    Xhdpi,
    Xxhdpi,
    Xxxhdpi,
}

impl ScreenDensity {
    pub const ALL: [ScreenDensity; 7] = [
        ScreenDensity::Ldpi,
        ScreenDensity::Mdpi,
        ScreenDensity::Tvdpi,
        ScreenDensity::Hdpi,
        ScreenDensity::Xhdpi,
        ScreenDensity::Xxhdpi,
        ScreenDensity::Xxxhdpi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenDensity::Ldpi => "ldpi",
            ScreenDensity::Mdpi => "mdpi",
            ScreenDensity::Tvdpi => "tvdpi",
            ScreenDensity::Hdpi => "hdpi",
            ScreenDensity::Xhdpi => "xhdpi",
            ScreenDensity::Xxhdpi => "xxhdpi",
            ScreenDensity::Xxxhdpi => "xxxhdpi",
        }
    }

    /// Dots per inch of the bucket
    pub fn dpi(&self) -> u32 {
        match self {
            ScreenDensity::Ldpi => 120,
            ScreenDensity::Mdpi => 160,
            ScreenDensity::Tvdpi => 213,
            ScreenDensity::Hdpi => 240,
            ScreenDensity::Xhdpi => 320,
            ScreenDensity::Xxhdpi => 480,
            ScreenDensity::Xxxhdpi => 640,
        }
    }

    /// Bucket whose dpi is exactly `dpi`
    pub fn from_dpi(dpi: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.dpi() == dpi)
    }

    /// Candidate closest to `dpi`; ties go to the higher density
    pub fn nearest<'a>(dpi: u32, candidates: impl IntoIterator<Item = &'a ScreenDensity>) -> Option<Self> {
        candidates
            .into_iter()
            .copied()
            .min_by_key(|d| (d.dpi().abs_diff(dpi), std::cmp::Reverse(d.dpi())))
    }
}

impl fmt::Display for ScreenDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScreenDensity {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        let by_name = Self::ALL.iter().copied().find(|d| d.as_str() == trimmed);
        let by_dpi = || {
            trimmed
                .trim_end_matches("dpi")
                .parse::<u32>()
                .ok()
                .and_then(Self::from_dpi)
        };
        by_name.or_else(by_dpi).ok_or_else(|| TargetingError::UnknownValue {
            dimension: Dimension::Density,
            value: s.to_string(),
        })
    }
}

impl DimensionValue for ScreenDensity {
    const DIMENSION: Dimension = Dimension::Density;

    fn closed_space() -> Option<&'static [Self]> {
        Some(&Self::ALL)
    }
}

/// Language code such as `fr` or `pt-br`, stored lowercase
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag (`pt` for `pt-br`)
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Language {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let mut parts = normalized.split('-');
        let primary_ok = parts
            .next()
            .map(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or(false);
        let subtags_ok = parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()));

        if primary_ok && subtags_ok {
            Ok(Language(normalized))
        } else {
            Err(TargetingError::UnknownValue {
                dimension: Dimension::Language,
                value: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for Language {
    type Error = TargetingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0
    }
}

impl DimensionValue for Language {
    const DIMENSION: Dimension = Dimension::Language;

    fn closed_space() -> Option<&'static [Self]> {
        None
    }
}

/// Texture compression format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TextureCompressionFormat {
    #[serde(rename = "etc1_rgb8")]
    Etc1Rgb8,
    #[serde(rename = "paletted")]
    Paletted,
    #[serde(rename = "3dc")]
    ThreeDc,
    #[serde(rename = "atc")]
    Atc,
    #[serde(rename = "latc")]
    Latc,
    #[serde(rename = "dxt1")]
    Dxt1,
    #[serde(rename = "s3tc")]
    S3tc,
    #[serde(rename = "pvrtc")]
    Pvrtc,
    #[serde(rename = "astc")]
    Astc,
    #[serde(rename = "etc2")]
    Etc2,
}

impl TextureCompressionFormat {
    pub const ALL: [TextureCompressionFormat; 10] = [
        TextureCompressionFormat::Etc1Rgb8,
        TextureCompressionFormat::Paletted,
        TextureCompressionFormat::ThreeDc,
        TextureCompressionFormat::Atc,
        TextureCompressionFormat::Latc,
        TextureCompressionFormat::Dxt1,
        TextureCompressionFormat::S3tc,
        TextureCompressionFormat::Pvrtc,
        TextureCompressionFormat::Astc,
        TextureCompressionFormat::Etc2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextureCompressionFormat::Etc1Rgb8 => "etc1_rgb8",
            TextureCompressionFormat::Paletted => "paletted",
            TextureCompressionFormat::ThreeDc => "3dc",
            TextureCompressionFormat::Atc => "atc",
            TextureCompressionFormat::Latc => "latc",
            TextureCompressionFormat::Dxt1 => "dxt1",
            TextureCompressionFormat::S3tc => "s3tc",
            TextureCompressionFormat::Pvrtc => "pvrtc",
            TextureCompressionFormat::Astc => "astc",
            TextureCompressionFormat::Etc2 => "etc2",
        }
    }
}

impl fmt::Display for TextureCompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextureCompressionFormat {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| TargetingError::UnknownValue {
                dimension: Dimension::TextureCompression,
                value: s.to_string(),
            })
    }
}

impl DimensionValue for TextureCompressionFormat {
    const DIMENSION: Dimension = Dimension::TextureCompression;

    fn closed_space() -> Option<&'static [Self]> {
        Some(&Self::ALL)
    }
}

/// Minimum platform API level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SdkVersion(pub u32);

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SdkVersion {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u32>() {
            Ok(level) if level > 0 => Ok(SdkVersion(level)),
            _ => Err(TargetingError::UnknownValue {
                dimension: Dimension::Sdk,
                value: s.to_string(),
            }),
        }
    }
}

impl DimensionValue for SdkVersion {
    const DIMENSION: Dimension = Dimension::Sdk;

    fn closed_space() -> Option<&'static [Self]> {
        None
    }
}

/// Device tier declared by the bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceTier(pub u32);

impl fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceTier {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(DeviceTier)
            .map_err(|_| TargetingError::UnknownValue {
                dimension: Dimension::DeviceTier,
                value: s.to_string(),
            })
    }
}

impl DimensionValue for DeviceTier {
    const DIMENSION: Dimension = Dimension::DeviceTier;

    fn closed_space() -> Option<&'static [Self]> {
        None
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Ord"))]
struct RawTargeted<T> {
    value: T,
    #[serde(default)]
    alternatives: BTreeSet<T>,
}

/// One dimension's value together with the sibling values it was split against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "RawTargeted<T>",
    bound(deserialize = "T: Deserialize<'de> + DimensionValue")
)]
pub struct Targeted<T> {
    value: T,
    alternatives: BTreeSet<T>,
}

impl<T: DimensionValue> Targeted<T> {
    /// Build a targeting value; the value may not appear in its own alternatives
    pub fn new(value: T, alternatives: impl IntoIterator<Item = T>) -> Result<Self, TargetingError> {
        let alternatives: BTreeSet<T> = alternatives.into_iter().collect();
        if alternatives.contains(&value) {
            return Err(TargetingError::ValueInAlternatives {
                dimension: T::DIMENSION,
                value: value.to_string(),
            });
        }
        Ok(Self { value, alternatives })
    }

    /// Targeting without any alternatives
    pub fn exact(value: T) -> Self {
        Self {
            value,
            alternatives: BTreeSet::new(),
        }
    }

    /// Value split against the rest of `space`
    pub fn against(value: T, space: impl IntoIterator<Item = T>) -> Self {
        let alternatives = space.into_iter().filter(|v| *v != value).collect();
        Self { value, alternatives }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn alternatives(&self) -> &BTreeSet<T> {
        &self.alternatives
    }

    /// Whether `candidate` is the value or one of the alternatives
    pub fn covers(&self, candidate: &T) -> bool {
        self.value == *candidate || self.alternatives.contains(candidate)
    }

    /// `{value} ∪ alternatives`
    pub fn covered(&self) -> BTreeSet<T> {
        let mut all = self.alternatives.clone();
        all.insert(self.value.clone());
        all
    }

    /// Floor-style match: the value is the highest covered value not above `device`
    pub fn selects_floor(&self, device: &T) -> bool {
        self.value <= *device
            && !self
                .alternatives
                .iter()
                .any(|alt| *alt > self.value && *alt <= *device)
    }
}

impl<T: DimensionValue> TryFrom<RawTargeted<T>> for Targeted<T> {
    type Error = TargetingError;

    fn try_from(raw: RawTargeted<T>) -> Result<Self, Self::Error> {
        Targeted::new(raw.value, raw.alternatives)
    }
}

/// Per-APK targeting over the split dimensions; absent dimensions match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkTargeting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<Targeted<Abi>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_density: Option<Targeted<ScreenDensity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Targeted<Language>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_compression: Option<Targeted<TextureCompressionFormat>>,
}

impl ApkTargeting {
    pub fn with_abi(mut self, targeting: Targeted<Abi>) -> Self {
        self.abi = Some(targeting);
        self
    }

    pub fn with_screen_density(mut self, targeting: Targeted<ScreenDensity>) -> Self {
        self.screen_density = Some(targeting);
        self
    }

    pub fn with_language(mut self, targeting: Targeted<Language>) -> Self {
        self.language = Some(targeting);
        self
    }

    pub fn with_texture_compression(mut self, targeting: Targeted<TextureCompressionFormat>) -> Self {
        self.texture_compression = Some(targeting);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions().is_empty()
    }

    /// Dimensions this targeting pins, in split-name order
    pub fn dimensions(&self) -> Vec<Dimension> {
        let mut dims = Vec::new();
        if self.abi.is_some() {
            dims.push(Dimension::Abi);
        }
        if self.screen_density.is_some() {
            dims.push(Dimension::Density);
        }
        if self.language.is_some() {
            dims.push(Dimension::Language);
        }
        if self.texture_compression.is_some() {
            dims.push(Dimension::TextureCompression);
        }
        dims
    }

    /// Split name built from every pinned value, e.g. `x86_fr`
    pub fn split_name(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(ref abi) = self.abi {
            parts.push(abi.value().as_str().replace('-', "_"));
        }
        if let Some(ref density) = self.screen_density {
            parts.push(density.value().to_string());
        }
        if let Some(ref language) = self.language {
            parts.push(language.value().to_string());
        }
        if let Some(ref tcf) = self.texture_compression {
            parts.push(tcf.value().to_string());
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("_"))
        }
    }
}

/// Targeting resolved at whole-install granularity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantTargeting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<Targeted<SdkVersion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<Targeted<Abi>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_tier: Option<Targeted<DeviceTier>>,
}

impl VariantTargeting {
    pub fn with_sdk_version(mut self, targeting: Targeted<SdkVersion>) -> Self {
        self.sdk_version = Some(targeting);
        self
    }

    pub fn with_abi(mut self, targeting: Targeted<Abi>) -> Self {
        self.abi = Some(targeting);
        self
    }

    pub fn with_device_tier(mut self, targeting: Targeted<DeviceTier>) -> Self {
        self.device_tier = Some(targeting);
        self
    }

    /// Lowest SDK level the variant serves
    pub fn sdk_floor(&self) -> Option<SdkVersion> {
        self.sdk_version.as_ref().map(|t| *t.value())
    }
}
