use super::checkpoint::SnapshotStore;
use super::config::RunConfig;
use super::error::{ComputeError, EngineError};
use super::metrics::{ErrorAccumulator, PassMetrics, Phase, RunLog};
use super::progress::{Progress, ProgressReporter};
use super::schedule::LrScheduler;
use super::state::TrainState;
use crate::data::batch::{GraphSpec, GraphTensors};
use crate::data::loader::BatchLoader;
use crate::data::provision::ProvisionedData;
use crate::model::potential::Potential;
use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use tracing::{info, instrument};

/// Losses and learning rate of one finished epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    /// Optimizer steps taken so far.
    pub step: usize,
    pub lr: f64,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val: PassMetrics,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub epochs_completed: usize,
    pub steps: usize,
    pub history: Vec<EpochSummary>,
    /// Snapshots retained when training stopped.
    pub retained: usize,
}

/// Drives the epochs of one run: a shuffled training pass with parameter updates, then a
/// validation pass without them.
pub struct Trainer<'a, 'r> {
    config: &'a RunConfig,
    data: &'a ProvisionedData,
    reporter: &'a ProgressReporter<'r>,
}

impl<'a, 'r> Trainer<'a, 'r> {
    pub fn new(
        config: &'a RunConfig,
        data: &'a ProvisionedData,
        reporter: &'a ProgressReporter<'r>,
    ) -> Self {
        Self {
            config,
            data,
            reporter,
        }
    }

    /// Trains `model` for the configured number of epochs.
    ///
    /// Metrics of both phases are appended to `log` after every epoch; `snapshots` is
    /// offered the model every `save_interval` epochs. When no epoch was offered, the
    /// final model is.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed batch, non-finite loss, or snapshot/log write error.
    #[instrument(skip_all, name = "training")]
    pub fn fit<B: AutodiffBackend>(
        &self,
        mut model: Potential<B>,
        device: &B::Device,
        log: &mut RunLog,
        snapshots: &mut SnapshotStore,
    ) -> Result<(Potential<B>, TrainingOutcome), EngineError> {
        let t = &self.config.training;
        let spec = GraphSpec::from(&self.config.model);
        let train_forces = self.config.model.derivative && t.neg_dy_weight > 0.0;
        let val_forces = self.config.model.derivative;

        let train_loader = BatchLoader::new(
            &self.data.dataset,
            self.data.splits.train.clone(),
            t.batch_size,
            spec,
        )
        .shuffled(t.seed)
        .with_workers(t.num_workers);
        let val_loader = BatchLoader::new(
            &self.data.dataset,
            self.data.splits.val.clone(),
            t.inference_batch_size,
            spec,
        )
        .with_workers(t.num_workers);

        let mut optimizer_config = AdamWConfig::new().with_weight_decay(t.weight_decay as f32);
        if let Some(max_norm) = t.gradient_clipping {
            optimizer_config = optimizer_config
                .with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm as f32)));
        }
        let mut optimizer = optimizer_config.init::<B, Potential<B>>();
        let mut scheduler = LrScheduler::new(t);
        let mse = MseLoss::new();

        info!(
            train = train_loader.num_samples(),
            val = val_loader.num_samples(),
            epochs = t.num_epochs,
            batches_per_epoch = train_loader.num_batches(),
            "Starting training."
        );
        self.reporter.report(Progress::PhaseStart { name: "Training" });

        let mut history = Vec::with_capacity(t.num_epochs);
        let mut step = 0usize;
        let mut state = TrainState::Idle.start(t.num_epochs)?;

        while let TrainState::Running { epoch } = state {
            self.reporter.report(Progress::TaskStart {
                total_steps: train_loader.num_batches() as u64,
            });
            let mut train = PassMetrics {
                energy: ErrorAccumulator::default(),
                forces: train_forces.then(ErrorAccumulator::default),
            };

            for batch in train_loader.epoch(epoch) {
                let batch = batch?;
                batch.check().map_err(ComputeError::ShapeMismatch)?;
                let graph = GraphTensors::<B>::from_batch(&batch, device);
                let out = model.forward(&graph, train_forces);

                let mut loss = mse
                    .forward(out.energy.clone(), graph.energies.clone(), Reduction::Mean)
                    .mul_scalar(t.y_weight);
                train
                    .energy
                    .add(out.energy.inner(), graph.energies.clone().inner());
                if let (Some(forces), Some(acc)) = (out.forces, train.forces.as_mut()) {
                    loss = loss
                        + mse
                            .forward(forces.clone(), graph.forces.clone(), Reduction::Mean)
                            .mul_scalar(t.neg_dy_weight);
                    acc.add(forces.inner(), graph.forces.clone().inner());
                }

                let value = loss.clone().into_scalar().elem::<f64>();
                if !value.is_finite() {
                    return Err(ComputeError::NonFiniteLoss { epoch, step, value }.into());
                }

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optimizer.step(scheduler.next_lr(), model, grads);
                step += 1;
                self.reporter.report(Progress::TaskIncrement);
            }
            self.reporter.report(Progress::TaskFinish);

            let val = run_pass(&model.valid(), &val_loader, device, val_forces)?;
            let train_loss = train.loss(t.y_weight, t.neg_dy_weight);
            let val_loss = val.loss(t.y_weight, t.neg_dy_weight);
            if !val_loss.is_finite() {
                return Err(ComputeError::NonFiniteLoss {
                    epoch,
                    step,
                    value: val_loss,
                }
                .into());
            }

            let lr = scheduler.lr();
            train.record(log, Phase::Train, epoch, step, train_loss)?;
            log.record(Phase::Train, epoch, step, "lr", lr)?;
            val.record(log, Phase::Val, epoch, step, val_loss)?;
            log.flush()?;
            scheduler.observe(val_loss);

            snapshots.save_last(&model)?;
            if (epoch + 1) % t.save_interval == 0 {
                snapshots.offer(&model, epoch, step, val_loss)?;
            }

            info!(
                epoch,
                step,
                lr,
                train_loss,
                val_loss,
                val_y_mae = val.energy.mae(),
                "Epoch complete."
            );
            self.reporter.report(Progress::EpochFinish {
                epoch,
                train_loss,
                val_loss,
            });
            history.push(EpochSummary {
                epoch,
                step,
                lr,
                train_loss,
                val_loss,
                val,
            });
            state = state.advance(t.num_epochs)?;
        }

        if snapshots.retained() == 0 {
            if let Some(last) = history.last() {
                snapshots.offer(&model, last.epoch, last.step, last.val_loss)?;
            }
        }
        snapshots.write_manifest()?;
        self.reporter.report(Progress::PhaseFinish);

        let epochs_completed = match state {
            TrainState::Stopped { epochs_completed } => epochs_completed,
            other => {
                return Err(EngineError::Internal(format!(
                    "training loop exited in state {other:?}"
                )));
            }
        };
        Ok((
            model,
            TrainingOutcome {
                epochs_completed,
                steps: step,
                history,
                retained: snapshots.retained(),
            },
        ))
    }
}

/// One pass over a split without parameter updates.
pub fn run_pass<B: Backend>(
    model: &Potential<B>,
    loader: &BatchLoader<'_>,
    device: &B::Device,
    with_forces: bool,
) -> Result<PassMetrics, EngineError> {
    let mut metrics = PassMetrics {
        energy: ErrorAccumulator::default(),
        forces: with_forces.then(ErrorAccumulator::default),
    };
    for batch in loader.epoch(0) {
        let batch = batch?;
        batch.check().map_err(ComputeError::ShapeMismatch)?;
        let graph = GraphTensors::<B>::from_batch(&batch, device);
        let out = model.forward(&graph, with_forces);
        metrics.energy.add(out.energy, graph.energies);
        if let (Some(forces), Some(acc)) = (out.forces, metrics.forces.as_mut()) {
            acc.add(forces, graph.forces);
        }
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::split::SplitSize;
    use crate::data::store::OfflineStore;
    use crate::data::validity::StructuralValidator;
    use crate::engine::checkpoint::{SnapshotManifest, LAST_FILE};
    use crate::engine::config::fixtures::{dataset_builder, training_builder};
    use crate::engine::device::CpuBackend;
    use crate::engine::metrics::METRICS_FILE;
    use crate::model::config::PotentialConfig;
    use crate::data::provision::provision;
    use crate::data::stats::Normalization;
    use crate::workflows::testing::write_synthetic_domain;
    use tempfile::tempdir;

    fn small_model() -> PotentialConfig {
        PotentialConfig::new()
            .with_embedding_dimension(8)
            .with_num_layers(1)
            .with_num_rbf(8)
            .with_max_z(10)
    }

    fn setup(dir: &std::path::Path, epochs: usize, save_interval: usize) -> (RunConfig, ProvisionedData) {
        let data_root = dir.join("data");
        std::fs::create_dir_all(&data_root).unwrap();
        write_synthetic_domain(&data_root, "1abcA00", 320, 24, 0);
        let config = RunConfig::new(
            dataset_builder(&data_root)
                .train_size(SplitSize::Count(12))
                .val_size(SplitSize::Count(6))
                .test_size(SplitSize::Remainder)
                .build()
                .unwrap(),
            small_model(),
            training_builder(&dir.join("logs"))
                .num_epochs(epochs)
                .save_interval(save_interval)
                .build()
                .unwrap(),
        )
        .unwrap();
        let data = provision(
            &config.dataset,
            &OfflineStore,
            &StructuralValidator::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        (config, data)
    }

    #[test]
    fn fit_runs_every_epoch_and_logs_both_phases() {
        let dir = tempdir().unwrap();
        let (config, data) = setup(dir.path(), 3, 1);
        let device = Default::default();
        CpuBackend::<f32>::seed(1);
        let model = config.model.init::<CpuBackend>(&data.stats, &device);

        let log_dir = &config.training.log_dir;
        let mut log = RunLog::open(log_dir).unwrap();
        let mut snapshots = SnapshotStore::new(log_dir, config.training.save_top_k);
        let reporter = ProgressReporter::new();
        let (_, outcome) = Trainer::new(&config, &data, &reporter)
            .fit(model, &device, &mut log, &mut snapshots)
            .unwrap();

        assert_eq!(outcome.epochs_completed, 3);
        assert_eq!(outcome.steps, 3 * 3);
        assert_eq!(outcome.retained, 2);
        assert!(log_dir.join(LAST_FILE).is_file());

        let rows = RunLog::read(&log_dir.join(METRICS_FILE)).unwrap();
        for phase in [Phase::Train, Phase::Val] {
            let losses = rows
                .iter()
                .filter(|r| r.phase == phase && r.name == "loss")
                .count();
            assert_eq!(losses, 3);
        }
        assert!(rows.iter().any(|r| r.name == "neg_dy_mae"));
    }

    #[test]
    fn final_model_is_offered_when_no_epoch_was() {
        let dir = tempdir().unwrap();
        let (config, data) = setup(dir.path(), 2, 5);
        let device = Default::default();
        let model = config
            .model
            .init::<CpuBackend>(&Normalization::identity(), &device);
        let log_dir = &config.training.log_dir;
        let mut log = RunLog::open(log_dir).unwrap();
        let mut snapshots = SnapshotStore::new(log_dir, 1);
        let reporter = ProgressReporter::new();
        Trainer::new(&config, &data, &reporter)
            .fit(model, &device, &mut log, &mut snapshots)
            .unwrap();

        let manifest = SnapshotManifest::load(log_dir).unwrap();
        assert_eq!(manifest.retained.len(), 1);
        assert_eq!(manifest.best().unwrap().epoch, 1);
    }

    #[test]
    fn neighbor_overflow_is_fatal() {
        let dir = tempdir().unwrap();
        let (mut config, data) = setup(dir.path(), 1, 1);
        config.model = small_model().with_max_num_neighbors(1);
        let device = Default::default();
        let model = config
            .model
            .init::<CpuBackend>(&Normalization::identity(), &device);
        let log_dir = config.training.log_dir.clone();
        let mut log = RunLog::open(&log_dir).unwrap();
        let mut snapshots = SnapshotStore::new(&log_dir, 1);
        let reporter = ProgressReporter::new();
        let err = Trainer::new(&config, &data, &reporter)
            .fit(model, &device, &mut log, &mut snapshots)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Compute {
                source: ComputeError::NeighborOverflow(_)
            }
        ));
    }
}
