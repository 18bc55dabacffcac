use super::potential::{Potential, PotentialOutput};
use crate::data::batch::{GraphBatch, GraphTensors};
use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Host-side predictions for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// One energy per molecule.
    pub energies: Vec<f64>,
    /// `[atom][xyz]`, present when the potential predicts forces.
    pub forces: Option<Vec<f64>>,
}

/// Queries a trained potential, deriving forces as the negative gradient of the summed
/// energy with respect to the atomic positions.
pub struct Predictor<B: AutodiffBackend> {
    model: Potential<B>,
    device: B::Device,
}

impl<B: AutodiffBackend> Predictor<B> {
    pub fn new(model: Potential<B>, device: B::Device) -> Self {
        // Only the positions take part in differentiation.
        Self {
            model: model.no_grad(),
            device,
        }
    }

    pub fn model(&self) -> &Potential<B> {
        &self.model
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn predicts_forces(&self) -> bool {
        self.model.predicts_forces()
    }

    /// Evaluates a batch already moved onto the device.
    pub fn predict(&self, graph: &GraphTensors<B>) -> PotentialOutput<B::InnerBackend> {
        if !self.predicts_forces() {
            let out = self.model.forward(graph, false);
            return PotentialOutput {
                energy: out.energy.inner(),
                forces: None,
            };
        }

        let positions = graph.positions.clone().detach().require_grad();
        let out = self
            .model
            .forward(&graph.with_positions(positions.clone()), false);
        let grads = out.energy.clone().sum().backward();
        let forces = match positions.grad(&grads) {
            Some(gradient) => gradient.neg(),
            None => positions.inner().zeros_like(),
        };

        PotentialOutput {
            energy: out.energy.inner(),
            forces: Some(forces),
        }
    }

    pub fn predict_batch(&self, batch: &GraphBatch) -> Prediction {
        let graph = GraphTensors::from_batch(batch, &self.device);
        let out = self.predict(&graph);
        Prediction {
            energies: out.energy.into_data().iter::<f64>().collect(),
            forces: out.forces.map(|f| f.into_data().iter::<f64>().collect()),
        }
    }
}

/// Drops autodiff tracking from a potential for evaluation without updates.
pub fn inference_model<B: AutodiffBackend>(model: &Potential<B>) -> Potential<B::InnerBackend> {
    model.valid()
}
