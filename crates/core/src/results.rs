//! Result Classifier
//!
//! Read-only queries that sort the variants of a [`BuildResult`] into
//! standalone, split and instant families. Each list keeps the relative order
//! of the build result.

use crate::model::{BuildResult, Variant, VariantKind};

/// Variants of the standalone family
pub fn standalone_variants(result: &BuildResult) -> Vec<&Variant> {
    variants_of_kind(result, VariantKind::Standalone)
}

/// Variants of the split family
pub fn split_variants(result: &BuildResult) -> Vec<&Variant> {
    variants_of_kind(result, VariantKind::Split)
}

/// Variants of the instant family
pub fn instant_apk_variants(result: &BuildResult) -> Vec<&Variant> {
    variants_of_kind(result, VariantKind::Instant)
}

pub fn is_standalone_apk_variant(variant: &Variant) -> bool {
    variant.kind() == VariantKind::Standalone
}

pub fn is_split_apk_variant(variant: &Variant) -> bool {
    variant.kind() == VariantKind::Split
}

pub fn is_instant_apk_variant(variant: &Variant) -> bool {
    variant.kind() == VariantKind::Instant
}

fn variants_of_kind(result: &BuildResult, kind: VariantKind) -> Vec<&Variant> {
    result.variants().iter().filter(|v| v.kind() == kind).collect()
}

/// Count of variants per family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantSummary {
    pub standalone: usize,
    pub split: usize,
    pub instant: usize,
}

impl VariantSummary {
    pub fn of(result: &BuildResult) -> Self {
        result.variants().iter().fold(Self::default(), |mut summary, variant| {
            match variant.kind() {
                VariantKind::Standalone => summary.standalone += 1,
                VariantKind::Split => summary.split += 1,
                VariantKind::Instant => summary.instant += 1,
            }
            summary
        })
    }

    pub fn total(&self) -> usize {
        self.standalone + self.split + self.instant
    }
}
