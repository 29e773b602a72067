//! bundlekit - device-targeted split and variant generation
//!
//! Command-line entry point: loads the configuration, initializes logging
//! and dispatches to one of the commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bundlekit::commands::{BuildApksCommand, ListVariantsCommand, ResolveCommand};
use bundlekit::core::config::AppConfig;
use bundlekit::core::VariantKind;

/// Generate device-targeted APK variants from a modular app bundle
#[derive(Parser, Debug)]
#[command(name = "bundlekit", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the split, instant and standalone variants of a bundle
    BuildApks {
        /// Bundle descriptor (JSON)
        #[arg(long)]
        bundle: PathBuf,
        /// Where to write the build result (JSON)
        #[arg(long)]
        output: Option<PathBuf>,
        /// SDK level from which split variants replace standalone APKs
        #[arg(long)]
        threshold: Option<u32>,
        /// Do not generate standalone variants
        #[arg(long)]
        no_standalones: bool,
        /// Do not generate the instant variant
        #[arg(long)]
        no_instant: bool,
        /// Per-module instant size ceiling in bytes
        #[arg(long)]
        instant_limit: Option<u64>,
        /// Number of modules processed in parallel
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Print the APKs a device installs from a build result
    Resolve {
        /// Build result (JSON)
        #[arg(long)]
        result: PathBuf,
        /// Device specification (JSON)
        #[arg(long)]
        device: PathBuf,
    },
    /// List the variants of a build result
    ListVariants {
        /// Build result (JSON)
        #[arg(long)]
        result: PathBuf,
        /// Only list variants of this family
        #[arg(long, value_enum)]
        family: Option<Family>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Family {
    Standalone,
    Split,
    Instant,
}

impl From<Family> for VariantKind {
    fn from(family: Family) -> Self {
        match family {
            Family::Standalone => VariantKind::Standalone,
            Family::Split => VariantKind::Split,
            Family::Instant => VariantKind::Instant,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path).await?,
        None => AppConfig::load().await?,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
        EnvFilter::new(level)
    });
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("bundlekit v{} starting", bundlekit::VERSION);

    match cli.command {
        Command::BuildApks {
            bundle,
            output,
            threshold,
            no_standalones,
            no_instant,
            instant_limit,
            jobs,
        } => {
            let mut settings = config.build.clone();
            if let Some(threshold) = threshold {
                settings.standalone_threshold_sdk = threshold;
            }
            if no_standalones {
                settings.generate_standalones = false;
            }
            if no_instant {
                settings.generate_instant = false;
            }
            if let Some(limit) = instant_limit {
                settings.instant_size_limit = limit;
            }
            if let Some(jobs) = jobs {
                settings.parallel_jobs = jobs;
            }
            settings.validate()?;

            let command = BuildApksCommand {
                bundle_path: bundle,
                output_path: output,
                settings,
                output: config.output.clone(),
            };
            let path = command.execute().await?;
            println!("{}", path.display());
        }
        Command::Resolve { result, device } => {
            let command = ResolveCommand {
                result_path: result,
                device_path: device,
            };
            for path in command.execute().await? {
                println!("{}", path);
            }
        }
        Command::ListVariants { result, family } => {
            let command = ListVariantsCommand {
                result_path: result,
                family: family.map(VariantKind::from),
            };
            for line in command.execute().await? {
                println!("{}", line);
            }
        }
    }

    info!("Done");
    Ok(())
}
