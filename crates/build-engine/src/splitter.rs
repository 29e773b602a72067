//! Split Generator
//!
//! Partitions one module's entries into a master APK plus one split APK per
//! distinct combination of non-default split-dimension values.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use bundlekit_core::{
    Abi, ApkDescription, ApkSet, ApkTargeting, BuildSettings, Dimension, DimensionValue, EntryRef, Language,
    ScreenDensity, Targeted, TextureCompressionFormat,
};

use crate::content::{EntryTargeting, ResolvedBundle, ResolvedEntry, ValueSpaces};
use crate::naming::ApkNaming;
use crate::BuildError;

/// Values an entry is split on; all `None` means master
type SplitKey = (
    Option<Abi>,
    Option<ScreenDensity>,
    Option<Language>,
    Option<TextureCompressionFormat>,
);

/// Splits modules of one resolved bundle
pub struct SplitGenerator<'a> {
    settings: &'a BuildSettings,
    spaces: &'a ValueSpaces,
    default_texture_compression: Option<TextureCompressionFormat>,
}

impl<'a> SplitGenerator<'a> {
    pub fn new(settings: &'a BuildSettings, bundle: &'a ResolvedBundle) -> Self {
        Self {
            settings,
            spaces: &bundle.spaces,
            default_texture_compression: bundle.metadata.default_texture_compression,
        }
    }

    fn split_key(&self, targeting: &EntryTargeting) -> SplitKey {
        let splits_on = |dimension| self.settings.splits_on(dimension);

        let abi = targeting.abi.filter(|_| splits_on(Dimension::Abi));
        let density = targeting.density.filter(|_| splits_on(Dimension::Density));
        let language = targeting.language.clone().filter(|_| splits_on(Dimension::Language));
        // The platform-default texture format ships in the master
        let texture_compression = targeting
            .texture_compression
            .filter(|_| splits_on(Dimension::TextureCompression))
            .filter(|format| Some(*format) != self.default_texture_compression);

        (abi, density, language, texture_compression)
    }

    fn apk_targeting(&self, key: &SplitKey) -> ApkTargeting {
        let (abi, density, language, texture_compression) = key;
        let spaces = self.spaces;
        let mut targeting = ApkTargeting::default();

        if let Some(abi) = abi {
            targeting = targeting.with_abi(split_against(abi, &spaces.abis));
        }
        if let Some(density) = density {
            targeting = targeting.with_screen_density(split_against(density, &spaces.densities));
        }
        if let Some(language) = language {
            targeting = targeting.with_language(split_against(language, &spaces.languages));
        }
        if let Some(format) = texture_compression {
            targeting = targeting.with_texture_compression(split_against(format, &spaces.texture_formats));
        }

        targeting
    }

    /// Build the APK set of `module` from the entries selected for one variant
    pub fn generate(&self, module: &str, entries: &[&ResolvedEntry], naming: &ApkNaming) -> Result<ApkSet, BuildError> {
        let mut groups: BTreeMap<SplitKey, Vec<&ResolvedEntry>> = BTreeMap::new();
        groups.entry((None, None, None, None)).or_default();
        for entry in entries {
            groups.entry(self.split_key(&entry.targeting)).or_default().push(entry);
        }

        let mut descriptions = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let targeting = self.apk_targeting(&key);
            let split_name = targeting.split_name();
            let path = naming.module_apk_path(module, split_name.as_deref());
            let refs = entry_refs(members.iter().map(|e| (module, *e)));
            let size = members.iter().map(|e| e.size).sum();

            let description = if split_name.is_none() {
                ApkDescription::master(targeting, path)
            } else {
                ApkDescription::split(targeting, path)
            };
            descriptions.push(description.with_entries(refs, size));
        }

        debug!(
            "Module '{}' split into master + {} split(s)",
            module,
            descriptions.len().saturating_sub(1)
        );
        Ok(ApkSet::new(module, descriptions)?)
    }
}

/// A split value against the rest of its dimension's value space
fn split_against<T: DimensionValue>(value: &T, observed: &BTreeSet<T>) -> Targeted<T> {
    Targeted::against(value.clone(), T::value_space(observed))
}

/// Sorted references to the entries packaged in one APK
pub(crate) fn entry_refs<'e>(entries: impl IntoIterator<Item = (&'e str, &'e ResolvedEntry)>) -> Vec<EntryRef> {
    let mut refs: Vec<EntryRef> = entries
        .into_iter()
        .map(|(owner, entry)| EntryRef::new(owner, entry.path.clone()))
        .collect();
    refs.sort();
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::resolve_bundle;
    use bundlekit_core::{Bundle, BundleMetadata, BundleModule, ContentEntry, TargetingTag};

    fn resolve(entries: Vec<ContentEntry>, metadata: BundleMetadata) -> ResolvedBundle {
        let module = entries.into_iter().fold(BundleModule::new("base"), |m, e| m.with_entry(e));
        resolve_bundle(&Bundle::new(metadata).with_module(module)).unwrap()
    }

    fn generate(bundle: &ResolvedBundle, settings: &BuildSettings) -> Result<ApkSet, BuildError> {
        let generator = SplitGenerator::new(settings, bundle);
        let entries: Vec<&ResolvedEntry> = bundle.modules[0].entries.iter().collect();
        generator.generate("base", &entries, &ApkNaming::split(None))
    }

    #[test]
    fn test_master_only_module() {
        let bundle = resolve(vec![ContentEntry::new("dex/classes.dex", 10)], BundleMetadata::new(21));
        let apk_set = generate(&bundle, &BuildSettings::default()).unwrap();

        assert_eq!(apk_set.apk_descriptions().len(), 1);
        assert!(apk_set.master().targeting().is_empty());
        assert_eq!(apk_set.master().path(), "splits/base-master.apk");
        assert_eq!(apk_set.master().size_bytes(), 10);
    }

    #[test]
    fn test_empty_module_still_has_master() {
        let bundle = resolve(vec![], BundleMetadata::new(21));
        let apk_set = generate(&bundle, &BuildSettings::default()).unwrap();
        assert_eq!(apk_set.apk_descriptions().len(), 1);
        assert!(apk_set.master().entries().is_empty());
    }

    #[test]
    fn test_abi_split_alternatives_cover_closed_space() {
        let bundle = resolve(
            vec![
                ContentEntry::new("dex/classes.dex", 10),
                ContentEntry::new("lib/x86/libgame.so", 4),
                ContentEntry::new("lib/arm64-v8a/libgame.so", 5),
            ],
            BundleMetadata::new(21),
        );
        let apk_set = generate(&bundle, &BuildSettings::default()).unwrap();

        let paths: Vec<&str> = apk_set.apk_descriptions().iter().map(|a| a.path()).collect();
        assert_eq!(
            paths,
            vec!["splits/base-master.apk", "splits/base-arm64_v8a.apk", "splits/base-x86.apk"]
        );

        for split in apk_set.splits() {
            let abi = split.targeting().abi.as_ref().unwrap();
            assert!(!abi.alternatives().contains(abi.value()));
            assert_eq!(abi.covered().len(), Abi::ALL.len());
        }
        assert_eq!(apk_set.master().entries().len(), 1);
    }

    #[test]
    fn test_multi_dimension_split_name() {
        let bundle = resolve(
            vec![
                ContentEntry::new("lib/x86/libgame.so", 4),
                ContentEntry::new("assets/voice#lang_fr/hello.ogg", 2),
                ContentEntry::new("lib/x86/libvoice.so", 1).with_tag(TargetingTag::new("language", "fr")),
            ],
            BundleMetadata::new(21),
        );
        let apk_set = generate(&bundle, &BuildSettings::default()).unwrap();

        let names: Vec<Option<String>> = apk_set
            .apk_descriptions()
            .iter()
            .map(|a| a.targeting().split_name())
            .collect();
        assert_eq!(
            names,
            vec![None, Some("fr".to_string()), Some("x86".to_string()), Some("x86_fr".to_string())]
        );
    }

    #[test]
    fn test_default_texture_format_stays_in_master() {
        let metadata = BundleMetadata::new(21).with_default_texture_compression(TextureCompressionFormat::Etc1Rgb8);
        let bundle = resolve(
            vec![
                ContentEntry::new("assets/tex#tcf_etc1_rgb8/sky.pkm", 3),
                ContentEntry::new("assets/tex#tcf_astc/sky.ktx", 2),
            ],
            metadata,
        );
        let apk_set = generate(&bundle, &BuildSettings::default()).unwrap();

        assert_eq!(apk_set.apk_descriptions().len(), 2);
        assert_eq!(apk_set.master().entries()[0].path, "assets/tex#tcf_etc1_rgb8/sky.pkm");
        let split = apk_set.splits().next().unwrap();
        assert_eq!(
            split.targeting().texture_compression.as_ref().map(|t| *t.value()),
            Some(TextureCompressionFormat::Astc)
        );
    }

    #[test]
    fn test_disabled_dimension_stays_in_master() {
        let bundle = resolve(
            vec![
                ContentEntry::new("res/values-fr/strings.xml", 1),
                ContentEntry::new("res/values-de/strings.xml", 1),
            ],
            BundleMetadata::new(21),
        );
        let settings = BuildSettings {
            split_dimensions: vec![Dimension::Abi],
            ..Default::default()
        };
        let apk_set = generate(&bundle, &settings).unwrap();
        assert_eq!(apk_set.apk_descriptions().len(), 1);
        assert_eq!(apk_set.master().entries().len(), 2);
    }
}
