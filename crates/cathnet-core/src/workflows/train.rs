use super::{INPUT_FILE, MODEL_CONFIG_FILE, SPLITS_FILE};
use crate::data::batch::GraphSpec;
use crate::data::loader::BatchLoader;
use crate::data::provision::{ProvisionReport, provision};
use crate::data::stats::Normalization;
use crate::data::store::RemoteStore;
use crate::data::validity::SampleValidator;
use crate::engine::checkpoint::{CheckpointError, SnapshotStore, load_potential};
use crate::engine::config::RunConfig;
use crate::engine::error::EngineError;
use crate::engine::evaluator::{TestMetrics, evaluate};
use crate::engine::metrics::RunLog;
use crate::engine::progress::ProgressReporter;
use crate::engine::trainer::{Trainer, TrainingOutcome};
use crate::model::predictor::Predictor;
use burn::config::Config;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct TrainResult {
    pub outcome: TrainingOutcome,
    /// The snapshot the test metrics were computed with.
    pub best_snapshot: PathBuf,
    pub test: TestMetrics,
    pub report: ProvisionReport,
    pub stats: Normalization,
}

/// Runs configuration → dataset → model → train → evaluate.
///
/// The resolved configuration, model hyperparameters and split indices are written to
/// the log directory before any training happens.
#[instrument(skip_all, name = "train_workflow")]
pub fn run<B: AutodiffBackend>(
    config: &RunConfig,
    store: &dyn RemoteStore,
    validator: &dyn SampleValidator,
    device: &B::Device,
    reporter: &ProgressReporter,
) -> Result<TrainResult, EngineError> {
    let log_dir = &config.training.log_dir;
    config.save_toml(&log_dir.join(INPUT_FILE))?;
    let model_config_path = log_dir.join(MODEL_CONFIG_FILE);
    config
        .model
        .save(&model_config_path)
        .map_err(|source| CheckpointError::Io {
            path: model_config_path.clone(),
            source,
        })?;

    let data = provision(&config.dataset, store, validator, reporter)?;
    data.splits.save(&log_dir.join(SPLITS_FILE))?;

    B::seed(config.training.seed);
    let model = match &config.training.load_model {
        Some(path) => {
            info!(path = %path.display(), "Initializing from snapshot.");
            let model = load_potential::<B>(&config.model, path, device)?;
            let carried = model.normalization();
            if carried != data.stats {
                warn!(
                    snapshot_mean = carried.mean,
                    snapshot_std = carried.std,
                    dataset_mean = data.stats.mean,
                    dataset_std = data.stats.std,
                    "Keeping the snapshot's energy statistics."
                );
            }
            model
        }
        None => config.model.init::<B>(&data.stats, device),
    };

    let mut log = RunLog::open(log_dir)?;
    let mut snapshots = SnapshotStore::new(log_dir, config.training.save_top_k);
    let (_, outcome) =
        Trainer::new(config, &data, reporter).fit(model, device, &mut log, &mut snapshots)?;

    let best_snapshot = snapshots.best_path()?;
    info!(path = %best_snapshot.display(), "Evaluating best snapshot on the test split.");
    let predictor = Predictor::new(
        load_potential::<B>(&config.model, &best_snapshot, device)?,
        device.clone(),
    );
    let loader = BatchLoader::new(
        &data.dataset,
        data.splits.test.clone(),
        config.training.inference_batch_size,
        GraphSpec::from(&config.model),
    )
    .with_workers(config.training.num_workers);
    let test = evaluate(&predictor, &loader, reporter)?;
    test.record(
        &mut log,
        outcome.epochs_completed.saturating_sub(1),
        outcome.steps,
    )?;

    Ok(TrainResult {
        outcome,
        best_snapshot,
        test,
        report: data.report,
        stats: data.stats,
    })
}
