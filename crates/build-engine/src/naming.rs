//! Output path naming for generated APKs

use bundlekit_core::Abi;

/// Where the APKs of one variant family are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApkNaming {
    /// `splits/<module>-<split>[_<label>].apk`
    Split { label: Option<String> },
    /// `instant/instant-<module>-<split>.apk`
    Instant,
}

impl ApkNaming {
    pub fn split(label: Option<String>) -> Self {
        ApkNaming::Split { label }
    }

    /// Path of a module APK; `split_name` is `None` for the master
    pub fn module_apk_path(&self, module: &str, split_name: Option<&str>) -> String {
        let split = split_name.unwrap_or("master");
        match self {
            ApkNaming::Split { label: Some(label) } => format!("splits/{}-{}_{}.apk", module, split, label),
            ApkNaming::Split { label: None } => format!("splits/{}-{}.apk", module, split),
            ApkNaming::Instant => format!("instant/instant-{}-{}.apk", module, split),
        }
    }
}

/// Path of a standalone APK
pub fn standalone_apk_path(abi: Option<Abi>) -> String {
    match abi {
        Some(abi) => format!("standalones/standalone-{}.apk", abi.as_str().replace('-', "_")),
        None => "standalones/standalone.apk".to_string(),
    }
}
