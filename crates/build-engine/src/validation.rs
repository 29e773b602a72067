//! APK set validation
//!
//! Structural checks run on every assembled APK set before it is placed in
//! the build result.

use std::collections::{BTreeSet, HashSet};

use bundlekit_core::{ApkSet, ApkTargeting, Dimension, DimensionValue, Targeted};

use crate::content::ValueSpaces;
use crate::BuildError;

/// Check master placement, split distinctness and per-dimension completeness
pub fn validate_apk_set(apk_set: &ApkSet, spaces: &ValueSpaces) -> Result<(), BuildError> {
    let module = apk_set.module_name();
    let master = apk_set.master();

    let mut seen: HashSet<&ApkTargeting> = HashSet::new();
    let mut single_values: HashSet<String> = HashSet::new();
    let mut split_dimensions: BTreeSet<Dimension> = BTreeSet::new();
    for split in apk_set.splits() {
        let targeting = split.targeting();
        let dimensions = targeting.dimensions();
        if dimensions.is_empty() {
            return Err(invalid(module, split.path(), "split APK carries no targeting"));
        }
        if !seen.insert(targeting) {
            return Err(invalid(module, split.path(), "two split APKs share the same targeting"));
        }
        // Combined splits repeat the values of their single-dimension siblings
        if dimensions.len() == 1 {
            let value = format!("{}={}", dimensions[0], targeting.split_name().unwrap_or_default());
            if !single_values.insert(value) {
                return Err(invalid(
                    module,
                    split.path(),
                    format!("two {} split APKs share the same value", dimensions[0]),
                ));
            }
        }
        split_dimensions.extend(dimensions);
    }

    if let Some(dimension) = master.targeting().dimensions().into_iter().find(|d| split_dimensions.contains(d)) {
        return Err(invalid(
            module,
            master.path(),
            format!("master APK is targeted on split dimension {}", dimension),
        ));
    }

    let splits: Vec<&ApkTargeting> = apk_set.splits().map(|s| s.targeting()).collect();
    check_coverage(module, splits.iter().filter_map(|t| t.abi.as_ref()), &spaces.abis)?;
    check_coverage(module, splits.iter().filter_map(|t| t.screen_density.as_ref()), &spaces.densities)?;
    check_coverage(module, splits.iter().filter_map(|t| t.language.as_ref()), &spaces.languages)?;
    check_coverage(
        module,
        splits.iter().filter_map(|t| t.texture_compression.as_ref()),
        &spaces.texture_formats,
    )?;

    Ok(())
}

/// The covered values of a split dimension must include its whole value space
fn check_coverage<'a, T: DimensionValue + 'a>(
    module: &str,
    targeted: impl Iterator<Item = &'a Targeted<T>>,
    observed: &BTreeSet<T>,
) -> Result<(), BuildError> {
    let mut covered: BTreeSet<T> = BTreeSet::new();
    let mut any = false;
    for targeting in targeted {
        any = true;
        covered.extend(targeting.covered());
    }
    if !any {
        return Ok(());
    }

    let missing: Vec<String> = T::value_space(observed)
        .into_iter()
        .filter(|value| !covered.contains(value))
        .map(|value| value.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BuildError::IncompleteTargeting {
            module: module.to_string(),
            dimension: T::DIMENSION,
            missing,
        })
    }
}

fn invalid(module: &str, path: &str, reason: impl Into<String>) -> BuildError {
    BuildError::MalformedTargeting {
        module: module.to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundlekit_core::{Abi, ApkDescription, Language};

    fn abi_split(abi: Abi, alternatives: Vec<Abi>) -> ApkDescription {
        let targeting = ApkTargeting::default().with_abi(Targeted::new(abi, alternatives).unwrap());
        ApkDescription::split(targeting, format!("splits/base-{}.apk", abi))
    }

    fn master() -> ApkDescription {
        ApkDescription::master(ApkTargeting::default(), "splits/base-master.apk")
    }

    #[test]
    fn test_complete_set_passes() {
        let set = ApkSet::new(
            "base",
            vec![
                master(),
                ApkDescription::split(
                    ApkTargeting::default().with_abi(Targeted::against(Abi::X86, Abi::ALL)),
                    "splits/base-x86.apk",
                ),
            ],
        )
        .unwrap();
        assert!(validate_apk_set(&set, &ValueSpaces::default()).is_ok());
    }

    #[test]
    fn test_incomplete_abi_coverage() {
        let set = ApkSet::new(
            "base",
            vec![master(), abi_split(Abi::X86, vec![Abi::Arm64V8a]), abi_split(Abi::Arm64V8a, vec![Abi::X86])],
        )
        .unwrap();

        match validate_apk_set(&set, &ValueSpaces::default()) {
            Err(BuildError::IncompleteTargeting { module, dimension, missing }) => {
                assert_eq!(module, "base");
                assert_eq!(dimension, Dimension::Abi);
                assert!(missing.contains(&"mips".to_string()));
                assert!(!missing.contains(&"x86".to_string()));
            }
            other => panic!("expected incomplete targeting, got {:?}", other),
        }
    }

    #[test]
    fn test_language_space_from_bundle() {
        let fr: Language = "fr".parse().unwrap();
        let de: Language = "de".parse().unwrap();
        let mut spaces = ValueSpaces::default();
        spaces.languages.extend([fr.clone(), de.clone()]);

        let split = ApkDescription::split(
            ApkTargeting::default().with_language(Targeted::exact(fr.clone())),
            "splits/base-fr.apk",
        );
        let set = ApkSet::new("base", vec![master(), split]).unwrap();
        assert!(matches!(
            validate_apk_set(&set, &spaces),
            Err(BuildError::IncompleteTargeting { dimension: Dimension::Language, .. })
        ));

        let split = ApkDescription::split(
            ApkTargeting::default().with_language(Targeted::against(fr, spaces.languages.iter().cloned())),
            "splits/base-fr.apk",
        );
        let set = ApkSet::new("base", vec![master(), split]).unwrap();
        assert!(validate_apk_set(&set, &spaces).is_ok());
    }

    #[test]
    fn test_duplicate_split_targeting() {
        let split = ApkDescription::split(
            ApkTargeting::default().with_abi(Targeted::against(Abi::X86, Abi::ALL)),
            "splits/base-x86.apk",
        );
        let set = ApkSet::new("base", vec![master(), split.clone(), split]).unwrap();
        assert!(matches!(
            validate_apk_set(&set, &ValueSpaces::default()),
            Err(BuildError::MalformedTargeting { .. })
        ));
    }

    #[test]
    fn test_single_dimension_splits_need_distinct_values() {
        let set = ApkSet::new(
            "base",
            vec![
                master(),
                ApkDescription::split(
                    ApkTargeting::default().with_abi(Targeted::against(Abi::X86, Abi::ALL)),
                    "splits/base-x86.apk",
                ),
                abi_split(Abi::X86, vec![Abi::Arm64V8a]),
            ],
        )
        .unwrap();
        match validate_apk_set(&set, &ValueSpaces::default()) {
            Err(BuildError::MalformedTargeting { reason, .. }) => assert!(reason.contains("abi")),
            other => panic!("expected malformed targeting, got {:?}", other),
        }
    }

    #[test]
    fn test_combined_split_may_repeat_single_values() {
        let fr: Language = "fr".parse().unwrap();
        let mut spaces = ValueSpaces::default();
        spaces.languages.insert(fr.clone());

        let x86 = ApkTargeting::default().with_abi(Targeted::against(Abi::X86, Abi::ALL));
        let french = ApkTargeting::default().with_language(Targeted::exact(fr.clone()));
        let set = ApkSet::new(
            "base",
            vec![
                master(),
                ApkDescription::split(x86.clone(), "splits/base-x86.apk"),
                ApkDescription::split(french, "splits/base-fr.apk"),
                ApkDescription::split(x86.with_language(Targeted::exact(fr)), "splits/base-x86_fr.apk"),
            ],
        )
        .unwrap();
        assert!(validate_apk_set(&set, &spaces).is_ok());
    }

    #[test]
    fn test_targeted_master_rejected() {
        let targeted_master = ApkDescription::master(
            ApkTargeting::default().with_abi(Targeted::against(Abi::Arm64V8a, Abi::ALL)),
            "splits/base-master.apk",
        );
        let split = ApkDescription::split(
            ApkTargeting::default().with_abi(Targeted::against(Abi::X86, Abi::ALL)),
            "splits/base-x86.apk",
        );
        let set = ApkSet::new("base", vec![targeted_master, split]).unwrap();
        let err = validate_apk_set(&set, &ValueSpaces::default()).unwrap_err();
        assert!(err.to_string().contains("master"));
    }
}
