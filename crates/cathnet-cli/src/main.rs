mod backend;
mod cli;
mod commands;
mod config;
mod data;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands, DataArgs};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

/// A command whose configuration is resolved and whose devices are masked.
enum Prepared {
    Train(commands::train::TrainPlan),
    Test(commands::test::TestPlan),
    Data(DataArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run_app(cli) {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app(cli: Cli) -> Result<()> {
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 cathnet CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let prepared = match cli.command {
        Commands::Train(args) => {
            let plan = commands::train::prepare(&args)?;
            backend::apply_device_mask(&plan.selection);
            Prepared::Train(plan)
        }
        Commands::Test(args) => {
            let plan = commands::test::prepare(&args)?;
            backend::apply_device_mask(&plan.selection);
            Prepared::Test(plan)
        }
        Commands::Data(args) => Prepared::Data(args),
    };

    if let Some(num_threads) = cli.threads {
        info!(
            "Setting Rayon global thread pool to {} threads.",
            num_threads
        );
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| {
                CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e))
            })?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let command_result = runtime.block_on(async {
        match prepared {
            Prepared::Train(plan) => {
                info!("Dispatching to 'train' command.");
                commands::train::run(plan).await
            }
            Prepared::Test(plan) => {
                info!("Dispatching to 'test' command.");
                commands::test::run(plan).await
            }
            Prepared::Data(args) => {
                info!("Dispatching to 'data' command.");
                commands::data::run(args).await
            }
        }
    });

    match &command_result {
        Ok(_) => {
            info!("✅ Command completed successfully.");
            println!("✅ Command completed successfully.");
        }
        Err(e) => {
            error!("❌ Command failed: {}", e);
        }
    }

    command_result
}
