use super::{INPUT_FILE, MODEL_CONFIG_FILE, SPLITS_FILE};
use crate::data::batch::GraphSpec;
use crate::data::loader::BatchLoader;
use crate::data::provision::{ProvisionReport, provision};
use crate::data::store::RemoteStore;
use crate::data::validity::SampleValidator;
use crate::engine::checkpoint::{SnapshotManifest, best_snapshot, load_potential};
use crate::engine::config::{ConfigError, RunConfig};
use crate::engine::error::EngineError;
use crate::engine::evaluator::{TestMetrics, evaluate};
use crate::engine::metrics::RunLog;
use crate::engine::progress::ProgressReporter;
use crate::model::config::PotentialConfig;
use crate::model::predictor::Predictor;
use burn::config::Config;
use burn::tensor::backend::AutodiffBackend;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct TestResult {
    pub metrics: TestMetrics,
    pub snapshot: PathBuf,
    pub report: ProvisionReport,
}

/// Loads the configuration of a finished run from its log directory.
///
/// The model section is taken from `model-config.json` when present, so that the
/// architecture always matches the snapshots written next to it.
pub fn load_run(log_dir: &Path) -> Result<RunConfig, ConfigError> {
    let mut config = RunConfig::load_toml(&log_dir.join(INPUT_FILE))?;
    let model_path = log_dir.join(MODEL_CONFIG_FILE);
    if model_path.is_file() {
        config.model = PotentialConfig::load(&model_path).map_err(|e| ConfigError::Load {
            path: model_path.clone(),
            message: e.to_string(),
        })?;
    }
    let splits_path = log_dir.join(SPLITS_FILE);
    if splits_path.is_file() {
        config.dataset.splits_file = Some(splits_path);
    }
    config.training.log_dir = log_dir.to_path_buf();
    Ok(config)
}

/// Evaluates a finished run on its test split.
///
/// Uses `snapshot` when given, otherwise the best snapshot of the run's manifest.
/// Metrics are appended to the run's log.
#[instrument(skip_all, name = "test_workflow")]
pub fn run<B: AutodiffBackend>(
    log_dir: &Path,
    snapshot: Option<&Path>,
    store: &dyn RemoteStore,
    validator: &dyn SampleValidator,
    device: &B::Device,
    reporter: &ProgressReporter,
) -> Result<TestResult, EngineError> {
    let config = load_run(log_dir)?;
    let data = provision(&config.dataset, store, validator, reporter)?;

    let snapshot = match snapshot {
        Some(path) => path.to_path_buf(),
        None => best_snapshot(log_dir)?,
    };
    info!(path = %snapshot.display(), "Evaluating snapshot.");

    let (epoch, step) = SnapshotManifest::load(log_dir)
        .ok()
        .and_then(|manifest| {
            manifest
                .retained
                .into_iter()
                .find(|meta| log_dir.join(&meta.file) == snapshot)
                .map(|meta| (meta.epoch, meta.step))
        })
        .unwrap_or((0, 0));

    let predictor = Predictor::new(
        load_potential::<B>(&config.model, &snapshot, device)?,
        device.clone(),
    );
    let loader = BatchLoader::new(
        &data.dataset,
        data.splits.test.clone(),
        config.training.inference_batch_size,
        GraphSpec::from(&config.model),
    )
    .with_workers(config.training.num_workers);
    let metrics = evaluate(&predictor, &loader, reporter)?;

    let mut log = RunLog::open(log_dir)?;
    metrics.record(&mut log, epoch, step)?;

    Ok(TestResult {
        metrics,
        snapshot,
        report: data.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::split::SplitSize;
    use crate::data::store::OfflineStore;
    use crate::data::validity::StructuralValidator;
    use crate::engine::checkpoint::CheckpointError;
    use crate::engine::config::fixtures::{dataset_builder, training_builder};
    use crate::engine::device::CpuBackend;
    use crate::workflows::testing::write_synthetic_domain;
    use crate::workflows::train;
    use tempfile::tempdir;

    fn trained_run(dir: &Path) -> (RunConfig, train::TrainResult) {
        let data_root = dir.join("data");
        std::fs::create_dir_all(&data_root).unwrap();
        write_synthetic_domain(&data_root, "1abcA00", 320, 30, 2);
        let config = RunConfig::new(
            dataset_builder(&data_root)
                .train_size(SplitSize::Remainder)
                .val_size(SplitSize::Count(6))
                .test_size(SplitSize::Count(6))
                .build()
                .unwrap(),
            PotentialConfig::new()
                .with_embedding_dimension(4)
                .with_num_layers(1)
                .with_num_rbf(4)
                .with_max_z(10),
            training_builder(&dir.join("logs")).build().unwrap(),
        )
        .unwrap();
        let result = train::run::<CpuBackend>(
            &config,
            &OfflineStore,
            &StructuralValidator::default(),
            &Default::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        (config, result)
    }

    #[test]
    fn reevaluation_reproduces_the_training_test_metrics() {
        let dir = tempdir().unwrap();
        let (config, trained) = trained_run(dir.path());
        assert_eq!(trained.report.excluded(), 2);

        let result = run::<CpuBackend>(
            &config.training.log_dir,
            None,
            &OfflineStore,
            &StructuralValidator::default(),
            &Default::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(result.snapshot, trained.best_snapshot);
        assert_eq!(result.metrics.num_samples, trained.test.num_samples);
        assert!((result.metrics.y_mae - trained.test.y_mae).abs() < 1e-6);
    }

    #[test]
    fn run_without_snapshots_reports_missing_manifest() {
        let dir = tempdir().unwrap();
        let (config, _) = trained_run(dir.path());
        let log_dir = &config.training.log_dir;
        std::fs::remove_file(log_dir.join(crate::engine::checkpoint::MANIFEST_FILE)).unwrap();

        let err = run::<CpuBackend>(
            log_dir,
            None,
            &OfflineStore,
            &StructuralValidator::default(),
            &Default::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Checkpoint {
                source: CheckpointError::Io { .. }
            }
        ));
    }
}
