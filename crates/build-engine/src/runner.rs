//! Build Runner
//!
//! Coordinates a whole build: content resolution, per-module split
//! generation on the blocking pool, then variant assembly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};

use bundlekit_core::{Bundle, BuildSettings};

use crate::assembler::VariantAssembler;
use crate::{BuildError, BuildOutput};

/// Build progress
#[derive(Debug, Clone, PartialEq)]
pub enum BuildProgress {
    Started,
    Resolving,
    GeneratingSplits { module: String, current: usize, total: usize },
    Assembling,
    Completed { variants: usize, duration_secs: f64 },
    Failed { error: String },
}

/// Build runner that coordinates the build process
#[derive(Debug, Clone, Default)]
pub struct BuildRunner {
    settings: BuildSettings,
}

impl BuildRunner {
    /// Create a new build runner
    pub fn new(settings: BuildSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Run the build
    pub async fn build(&self, bundle: &Bundle) -> Result<BuildOutput, BuildError> {
        self.run(bundle, None).await
    }

    /// Build with progress reporting
    pub async fn build_with_progress(
        &self,
        bundle: &Bundle,
        tx: mpsc::Sender<BuildProgress>,
    ) -> Result<BuildOutput, BuildError> {
        let start = Instant::now();
        let _ = tx.send(BuildProgress::Started).await;

        let result = self.run(bundle, Some(&tx)).await;
        let progress = match result {
            Ok(ref output) => BuildProgress::Completed {
                variants: output.result.variants().len(),
                duration_secs: start.elapsed().as_secs_f64(),
            },
            Err(ref e) => BuildProgress::Failed { error: e.to_string() },
        };
        let _ = tx.send(progress).await;

        result
    }

    async fn run(
        &self,
        bundle: &Bundle,
        tx: Option<&mpsc::Sender<BuildProgress>>,
    ) -> Result<BuildOutput, BuildError> {
        let start = Instant::now();
        info!("Starting build of {} module(s)", bundle.modules.len());

        report(tx, BuildProgress::Resolving).await;
        let assembler = VariantAssembler::from_bundle(bundle, self.settings.clone())?;
        let plan = Arc::new(assembler.plan()?);

        let total = assembler.bundle().modules.len();
        let permits = Arc::new(Semaphore::new(self.settings.parallel_jobs.max(1)));
        let completed = Arc::new(AtomicUsize::new(0));

        let tasks = assembler.bundle().modules.iter().map(|module| {
            let assembler = assembler.clone();
            let plan = Arc::clone(&plan);
            let permits = Arc::clone(&permits);
            let completed = Arc::clone(&completed);
            let progress = tx.cloned();
            let name = module.name.clone();

            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| BuildError::Task(e.to_string()))?;

                let task_name = name.clone();
                let apk_sets = tokio::task::spawn_blocking(move || assembler.generate_module(&task_name, &plan))
                    .await
                    .map_err(|e| BuildError::Task(format!("module '{}': {}", name, e)))??;

                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = progress {
                    let _ = progress
                        .send(BuildProgress::GeneratingSplits { module: name, current, total })
                        .await;
                }
                Ok::<_, BuildError>(apk_sets)
            }
        });

        let modules = match try_join_all(tasks).await {
            Ok(modules) => modules,
            Err(e) => {
                error!("Split generation failed: {}", e);
                return Err(e);
            }
        };

        report(tx, BuildProgress::Assembling).await;
        let output = assembler.assemble(&plan, modules)?;

        info!(
            "Build completed in {:.2}s: {} variant(s)",
            start.elapsed().as_secs_f64(),
            output.result.variants().len()
        );
        Ok(output)
    }
}

async fn report(tx: Option<&mpsc::Sender<BuildProgress>>, progress: BuildProgress) {
    if let Some(tx) = tx {
        let _ = tx.send(progress).await;
    }
}
