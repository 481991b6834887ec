//! MapPacker - Batch packer and Steam Workshop uploader for Source engine maps
//!
//! Main entry point for the command-line tool.
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Initialize logging → logs/mappacker_<timestamp>.log plus the console
//! 3. Load and validate `settings.json` and every archive set under `configs/`
//! 4. Print the settings summary and wait for `y`
//! 5. Pack every enabled map with bspzip
//! 6. Upload the maps marked for the workshop (requires the `steam` feature)
//! 7. Wait for enter, then exit with 0 on success or 1 on any error
//!
//! # Runtime
//!
//! A current-thread tokio runtime drives everything: the bspzip subprocess waits, the
//! workshop poll loop and the upload cooldown. The Steam callback pump is not `Send`,
//! so nothing is spawned onto other threads.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use mappacker::app::{self, PipelineOptions, RunOutcome};
use mappacker::config::{ConfigManager, DEFAULT_CONFIG_DIR, DEFAULT_SETTINGS_FILE};
use mappacker::logging::{self, LoggingHandle};
use mappacker::services::BspZip;
use mappacker::ui::{ConsoleOperator, Operator};
use mappacker::{APP_NAME, RunMetrics, VERSION};
use std::process::ExitCode;

/// Pack Source engine maps with their custom assets and publish them to the Steam Workshop
#[derive(Debug, Parser)]
#[command(name = "mappacker", version, about)]
struct Cli {
    /// Settings document
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: Utf8PathBuf,

    /// Directory holding the archive-set documents named in `bspConfigFileNames`
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: Utf8PathBuf,

    /// Directory for the per-run log transcripts
    #[arg(long, default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Skip the settings confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// Exit without waiting for enter
    #[arg(long)]
    no_pause: bool,

    /// Don't open the output directory after packing
    #[arg(long)]
    no_open: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = match logging::setup_logging(&cli.log_dir, APP_NAME, true) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(1);
        }
    };

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let mut operator = ConsoleOperator::stdio();
    let result = run(&cli, &logging, &mut operator);

    let code = match result {
        Ok(RunOutcome::Declined) => ExitCode::SUCCESS,
        Ok(RunOutcome::Completed { .. }) => {
            tracing::info!("Finished. Transcript written to {}", logging.log_file());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(1)
        }
    };

    if !cli.no_pause {
        operator.acknowledge();
    }

    code
}

fn run(cli: &Cli, logging: &LoggingHandle, operator: &mut impl Operator) -> Result<RunOutcome> {
    let config = ConfigManager::new(cli.settings.clone(), cli.config_dir.clone());
    tracing::info!("> Parsing Settings & Bsp Configs");
    let mut project = config.load_project()?;

    if project.settings.verbose_logging {
        logging.set_verbose(true)?;
    }

    let tool = BspZip::new(
        project.settings.bspzip_path.clone(),
        project.settings.gameinfo_path.clone(),
    );
    let metrics = RunMetrics::new();
    let options = PipelineOptions {
        assume_yes: cli.yes,
        open_output: !cli.no_open,
        ..Default::default()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    #[cfg(feature = "steam")]
    let connect = mappacker::services::SteamWorkshop::connect;
    #[cfg(not(feature = "steam"))]
    let connect = || Err::<app::NoWorkshop, _>(mappacker::services::PublishError::Unsupported);

    runtime.block_on(app::run_pipeline(
        &mut project,
        &tool,
        operator,
        connect,
        &metrics,
        &options,
    ))
}
