use crate::backend;
use crate::cli::TrainArgs;
use crate::config::build_run_config;
use crate::data::{self, DataManager};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use cathnet::data::validity::StructuralValidator;
use cathnet::engine::config::{Accelerator, Precision, RunConfig};
use cathnet::engine::device::{CpuBackend, DeviceSelection};
use cathnet::engine::progress::ProgressReporter;
use cathnet::workflows::train::{self, TrainResult};
use tracing::{info, warn};

/// A resolved `train` invocation, built before the async runtime starts.
#[derive(Debug)]
pub struct TrainPlan {
    pub config: RunConfig,
    pub selection: DeviceSelection,
}

pub fn prepare(args: &TrainArgs) -> Result<TrainPlan> {
    info!("Initializing data manager...");
    let data_manager = DataManager::new()?;

    info!("Merging configuration from defaults, file and CLI arguments...");
    let config = build_run_config(args, &data_manager)?;
    let selection = DeviceSelection::from_config(&config.training);
    Ok(TrainPlan { config, selection })
}

pub async fn run(plan: TrainPlan) -> Result<()> {
    let TrainPlan { config, selection } = plan;
    let store = data::remote_store(config.dataset.remote_url.as_deref())?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Training on {} domain(s) with {}; logging to {}",
        config.dataset.domains.len(),
        selection.describe(),
        config.training.log_dir.display()
    );
    info!("Invoking the core training workflow...");

    let result = tokio::task::block_in_place(|| -> Result<TrainResult> {
        let validator = StructuralValidator::default();
        Ok(match (selection.accelerator, selection.precision) {
            (Accelerator::Cpu, Precision::Single) => train::run::<CpuBackend<f32>>(
                &config,
                store.as_ref(),
                &validator,
                &Default::default(),
                &reporter,
            )?,
            (Accelerator::Cpu, Precision::Double) => train::run::<CpuBackend<f64>>(
                &config,
                store.as_ref(),
                &validator,
                &Default::default(),
                &reporter,
            )?,
            #[cfg(feature = "wgpu")]
            (Accelerator::Gpu, _) => train::run::<backend::GpuBackend>(
                &config,
                store.as_ref(),
                &validator,
                &backend::gpu_device(&selection),
                &reporter,
            )?,
            #[cfg(not(feature = "wgpu"))]
            (Accelerator::Gpu, _) => return Err(backend::gpu_unavailable()),
        })
    })?;

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &TrainResult) {
    if !result.report.fetched.is_empty() {
        println!("  Fetched {} domain file(s).", result.report.fetched.len());
    }
    if result.report.excluded() > 0 {
        warn!("{} invalid frame(s) were excluded.", result.report.excluded());
        println!("  Excluded {} invalid frame(s).", result.report.excluded());
    }
    println!(
        "✓ Trained {} epoch(s) in {} step(s); {} snapshot(s) retained.",
        result.outcome.epochs_completed, result.outcome.steps, result.outcome.retained
    );
    println!("  Best snapshot: {}", result.best_snapshot.display());
    match result.test.neg_dy_mae {
        Some(force_mae) => println!(
            "  Test on {} sample(s): energy MAE {:.4}, force MAE {:.4}",
            result.test.num_samples, result.test.y_mae, force_mae
        ),
        None => println!(
            "  Test on {} sample(s): energy MAE {:.4}",
            result.test.num_samples, result.test.y_mae
        ),
    }
}
