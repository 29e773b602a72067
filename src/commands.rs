//! CLI commands for bundlekit
//!
//! Each command loads its inputs from disk, runs one library operation and
//! hands back something printable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use bundlekit_build_engine::{BuildProgress, BuildRunner};
use bundlekit_core::config::OutputSettings;
use bundlekit_core::results::{self, VariantSummary};
use bundlekit_core::{Bundle, BuildResult, BuildSettings, Variant, VariantKind};
use bundlekit_device_matcher::{DeviceMatcher, DeviceSpec};

/// Default file name for a build result written to the output directory
pub const BUILD_RESULT_FILE: &str = "build-result.json";

/// Build APKs command options
pub struct BuildApksCommand {
    pub bundle_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub settings: BuildSettings,
    pub output: OutputSettings,
}

impl BuildApksCommand {
    /// Execute the build, returning where the build result was written
    pub async fn execute(&self) -> Result<PathBuf> {
        info!("Building APKs from {:?}", self.bundle_path);

        let bundle = Bundle::load(&self.bundle_path)
            .await
            .with_context(|| format!("Failed to load bundle descriptor {:?}", self.bundle_path))?;

        let (tx, mut rx) = mpsc::channel(32);
        let logger = tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                log_progress(&progress);
            }
        });

        let runner = BuildRunner::new(self.settings.clone());
        let output = runner.build_with_progress(&bundle, tx).await;
        let _ = logger.await;
        let output = output?;

        for warning in &output.warnings {
            warn!("{}", warning);
        }

        let path = self.result_path();
        write_build_result(&output.result, &path, self.output.pretty_json).await?;

        let summary = VariantSummary::of(&output.result);
        info!(
            "Wrote {} variant(s) ({} split, {} instant, {} standalone) to {:?}",
            summary.total(),
            summary.split,
            summary.instant,
            summary.standalone,
            path
        );
        Ok(path)
    }

    fn result_path(&self) -> PathBuf {
        match (&self.output_path, &self.output.output_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(BUILD_RESULT_FILE),
            (None, None) => PathBuf::from(BUILD_RESULT_FILE),
        }
    }
}

fn log_progress(progress: &BuildProgress) {
    match progress {
        BuildProgress::Started => debug!("Build started"),
        BuildProgress::Resolving => debug!("Resolving module content"),
        BuildProgress::GeneratingSplits { module, current, total } => {
            info!("[{}/{}] Generated splits for '{}'", current, total, module)
        }
        BuildProgress::Assembling => debug!("Assembling variants"),
        BuildProgress::Completed { variants, duration_secs } => {
            info!("Built {} variant(s) in {:.2}s", variants, duration_secs)
        }
        BuildProgress::Failed { error } => warn!("Build failed: {}", error),
    }
}

async fn write_build_result(result: &BuildResult, path: &Path, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = result.to_json(pretty)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write build result {:?}", path))?;
    Ok(())
}

/// Load a previously written build result
pub async fn load_build_result(path: &Path) -> Result<BuildResult> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read build result {:?}", path))?;
    let result = BuildResult::from_json(&contents)
        .with_context(|| format!("Invalid build result {:?}", path))?;
    Ok(result)
}

/// Resolve command options
pub struct ResolveCommand {
    pub result_path: PathBuf,
    pub device_path: PathBuf,
}

impl ResolveCommand {
    /// Execute the resolution, returning the APK paths the device installs
    pub async fn execute(&self) -> Result<Vec<String>> {
        let result = load_build_result(&self.result_path).await?;
        let device = DeviceSpec::load(&self.device_path)
            .await
            .with_context(|| format!("Failed to load device spec {:?}", self.device_path))?;

        let paths = DeviceMatcher::new(device).resolve(&result)?;
        Ok(paths)
    }
}

/// List variants command options
pub struct ListVariantsCommand {
    pub result_path: PathBuf,
    pub family: Option<VariantKind>,
}

impl ListVariantsCommand {
    /// Execute the listing, returning one line per variant plus a summary line
    pub async fn execute(&self) -> Result<Vec<String>> {
        let result = load_build_result(&self.result_path).await?;

        let variants = match self.family {
            Some(VariantKind::Standalone) => results::standalone_variants(&result),
            Some(VariantKind::Split) => results::split_variants(&result),
            Some(VariantKind::Instant) => results::instant_apk_variants(&result),
            None => result.variants().iter().collect(),
        };

        let mut lines: Vec<String> = variants.iter().map(|v| describe_variant(v)).collect();
        let summary = VariantSummary::of(&result);
        lines.push(format!(
            "{} variant(s): {} split, {} instant, {} standalone",
            summary.total(),
            summary.split,
            summary.instant,
            summary.standalone
        ));
        Ok(lines)
    }
}

fn describe_variant(variant: &Variant) -> String {
    let targeting = variant.targeting();
    let mut line = format!("#{} {}", variant.variant_number(), variant.kind());

    if let Some(sdk) = targeting.sdk_floor() {
        line.push_str(&format!(" sdk>={}", sdk));
    }
    if let Some(abi) = &targeting.abi {
        line.push_str(&format!(" abi={}", abi.value()));
    }
    if let Some(tier) = &targeting.device_tier {
        line.push_str(&format!(" tier={}", tier.value()));
    }

    let modules: Vec<&str> = variant.apk_sets().iter().map(|s| s.module_name()).collect();
    line.push_str(&format!(" modules={}", modules.join(",")));
    line
}
