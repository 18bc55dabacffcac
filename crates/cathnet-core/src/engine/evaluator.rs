use super::error::{ComputeError, EngineError};
use super::metrics::{ErrorAccumulator, Phase, RunLog, RunLogError};
use super::progress::{Progress, ProgressReporter};
use crate::data::batch::GraphTensors;
use crate::data::error::DataError;
use crate::data::loader::BatchLoader;
use crate::model::predictor::Predictor;
use burn::tensor::backend::AutodiffBackend;
use serde::Serialize;
use tracing::{info, instrument};

/// Errors of a trained potential on the test split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestMetrics {
    /// Mean absolute energy error, kcal/mol.
    pub y_mae: f64,
    /// Mean absolute force component error, kcal/mol/Angstrom.
    pub neg_dy_mae: Option<f64>,
    pub num_samples: usize,
}

impl TestMetrics {
    pub fn record(&self, log: &mut RunLog, epoch: usize, step: usize) -> Result<(), RunLogError> {
        log.record(Phase::Test, epoch, step, "y_mae", self.y_mae)?;
        if let Some(mae) = self.neg_dy_mae {
            log.record(Phase::Test, epoch, step, "neg_dy_mae", mae)?;
        }
        log.record(Phase::Test, epoch, step, "num_samples", self.num_samples as f64)?;
        log.flush()
    }
}

/// Runs one pass over `loader` with `predictor`, without parameter updates.
///
/// Forces are obtained by differentiating the predicted energy with respect to the
/// positions.
#[instrument(skip_all, name = "evaluation")]
pub fn evaluate<B: AutodiffBackend>(
    predictor: &Predictor<B>,
    loader: &BatchLoader<'_>,
    reporter: &ProgressReporter,
) -> Result<TestMetrics, EngineError> {
    if loader.num_samples() == 0 {
        return Err(DataError::EmptySplit { split: "test" }.into());
    }

    let mut energy = ErrorAccumulator::default();
    let mut forces = predictor.predicts_forces().then(ErrorAccumulator::default);

    reporter.report(Progress::PhaseStart { name: "Testing" });
    reporter.report(Progress::TaskStart {
        total_steps: loader.num_batches() as u64,
    });
    for batch in loader.epoch(0) {
        let batch = batch?;
        batch.check().map_err(ComputeError::ShapeMismatch)?;
        let graph = GraphTensors::<B>::from_batch(&batch, predictor.device());
        let out = predictor.predict(&graph);
        energy.add(out.energy, graph.energies.inner());
        if let (Some(predicted), Some(acc)) = (out.forces, forces.as_mut()) {
            acc.add(predicted, graph.forces.inner());
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let metrics = TestMetrics {
        y_mae: energy.mae(),
        neg_dy_mae: forces.map(|f| f.mae()),
        num_samples: energy.count(),
    };
    info!(
        y_mae = metrics.y_mae,
        neg_dy_mae = ?metrics.neg_dy_mae,
        samples = metrics.num_samples,
        "Test evaluation complete."
    );
    Ok(metrics)
}
