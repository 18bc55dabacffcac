use super::config::{Activation, PotentialConfig};
use super::radial::{CosineCutoff, RadialBasis};
use crate::data::batch::GraphTensors;
use crate::data::stats::Normalization;
use burn::module::{Ignored, Param};
use burn::nn::{Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;

/// Per-molecule energies and, when requested, per-atom forces.
#[derive(Debug, Clone)]
pub struct PotentialOutput<B: Backend> {
    /// `[molecules]`, kcal/mol.
    pub energy: Tensor<B, 1>,
    /// `[atoms, 3]`, kcal/mol/Angstrom.
    pub forces: Option<Tensor<B, 2>>,
}

/// A neural pair potential.
///
/// Each atom contributes a reference energy read from its element embedding. Each
/// neighbor pair contributes a learned function of its distance, expanded in a radial
/// basis and gated by the product of both embeddings, passed through a stack of dense
/// layers and damped by a cosine envelope. The raw molecular sum is rescaled with the
/// training energy statistics, which are stored as constant parameters so that every
/// snapshot carries them.
///
/// Forces are propagated alongside the energy in forward mode, which keeps a force loss
/// differentiable with respect to the parameters under first-order reverse-mode autodiff.
#[derive(Module, Debug)]
pub struct Potential<B: Backend> {
    embedding: Embedding<B>,
    rbf_projection: Linear<B>,
    layers: Vec<Linear<B>>,
    head: Linear<B>,
    atom_reference: Linear<B>,
    energy_mean: Param<Tensor<B, 1>>,
    energy_std: Param<Tensor<B, 1>>,
    activation: Ignored<Activation>,
    radial: Ignored<RadialBasis>,
    cutoff: Ignored<CosineCutoff>,
    derivative: Ignored<bool>,
}

fn constant<B: Backend>(value: f64, device: &B::Device) -> Param<Tensor<B, 1>> {
    Param::from_tensor(Tensor::from_data(TensorData::new(vec![value], [1]), device))
        .set_require_grad(false)
}

impl PotentialConfig {
    /// Builds a freshly initialized potential.
    ///
    /// Initialization draws from the backend's random generator; seed it with
    /// `B::seed` beforehand for reproducible weights.
    pub fn init<B: Backend>(&self, stats: &Normalization, device: &B::Device) -> Potential<B> {
        let width = self.embedding_dimension;
        Potential {
            embedding: EmbeddingConfig::new(self.max_z, width).init(device),
            rbf_projection: LinearConfig::new(self.num_rbf, width).init(device),
            layers: (0..self.num_layers)
                .map(|_| LinearConfig::new(width, width).init(device))
                .collect(),
            head: LinearConfig::new(width, 1).init(device),
            atom_reference: LinearConfig::new(width, 1).init(device),
            energy_mean: constant(stats.mean, device),
            energy_std: constant(stats.std, device),
            activation: Ignored(self.activation),
            radial: Ignored(RadialBasis::new(
                self.rbf_type,
                self.num_rbf,
                self.cutoff_lower,
                self.cutoff_upper,
            )),
            cutoff: Ignored(CosineCutoff::new(self.cutoff_lower, self.cutoff_upper)),
            derivative: Ignored(self.derivative),
        }
    }
}

impl<B: Backend> Potential<B> {
    /// Whether this potential was configured to predict forces.
    pub fn predicts_forces(&self) -> bool {
        *self.derivative
    }

    /// The energy statistics the potential was built with.
    pub fn normalization(&self) -> Normalization {
        Normalization {
            mean: self.energy_mean.val().into_scalar().elem::<f64>(),
            std: self.energy_std.val().into_scalar().elem::<f64>(),
        }
    }

    /// Evaluates energies, and forces when `with_forces` is set.
    pub fn forward(&self, graph: &GraphTensors<B>, with_forces: bool) -> PotentialOutput<B> {
        let device = graph.positions.device();
        let embeddings = self
            .embedding
            .weight
            .val()
            .select(0, graph.atomic_numbers.clone());

        let atom_energy = self.atom_reference.forward(embeddings.clone());
        let mut raw = Tensor::<B, 2>::zeros([graph.num_molecules, 1], &device).select_assign(
            0,
            graph.molecule_index.clone(),
            atom_energy,
        );

        let mut gradient = None;
        if graph.num_pairs > 0 {
            let pos_i = graph.positions.clone().select(0, graph.pair_i.clone());
            let pos_j = graph.positions.clone().select(0, graph.pair_j.clone());
            let vec = pos_j - pos_i;
            let dist = vec.clone().powf_scalar(2.0).sum_dim(1).sqrt();

            let (pair_energy, pair_derivative) =
                self.pair_energy(embeddings, graph, dist.clone(), with_forces);
            raw = raw.select_assign(0, graph.pair_molecule.clone(), pair_energy);

            if let Some(d_energy) = pair_derivative {
                // dE/dr_j = dE/dd * (r_j - r_i) / d, and the opposite for r_i
                let pair_gradient = vec * (d_energy / dist);
                gradient = Some(
                    Tensor::<B, 2>::zeros([graph.num_atoms, 3], &device)
                        .select_assign(0, graph.pair_j.clone(), pair_gradient.clone())
                        .select_assign(0, graph.pair_i.clone(), pair_gradient.neg()),
                );
            }
        }

        let std = self.energy_std.val().reshape([1, 1]);
        let mean = self.energy_mean.val().reshape([1, 1]);
        let energy = (raw * std.clone() + mean).reshape([graph.num_molecules]);

        let forces = with_forces.then(|| match gradient {
            Some(g) => (g * std).neg(),
            None => Tensor::zeros([graph.num_atoms, 3], &device),
        });

        PotentialOutput { energy, forces }
    }

    /// Pair energies `[pairs, 1]` and their derivatives with respect to the pair distance.
    fn pair_energy(
        &self,
        embeddings: Tensor<B, 2>,
        graph: &GraphTensors<B>,
        dist: Tensor<B, 2>,
        with_derivative: bool,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 2>>) {
        let gate = embeddings.clone().select(0, graph.pair_i.clone())
            * embeddings.select(0, graph.pair_j.clone());

        let (rbf, d_rbf) = self.radial.evaluate(dist.clone(), with_derivative);
        let mut x = self.rbf_projection.forward(rbf) * gate.clone();
        let mut dx = d_rbf.map(|d| d.matmul(self.rbf_projection.weight.val()) * gate);

        for layer in &self.layers {
            let (y, dy) = self.activation.evaluate(layer.forward(x), dx.is_some());
            dx = match (dx, dy) {
                (Some(dx), Some(dy)) => Some(dx.matmul(layer.weight.val()) * dy),
                _ => None,
            };
            x = y;
        }

        let phi = self.head.forward(x);
        let d_phi = dx.map(|dx| dx.matmul(self.head.weight.val()));

        let (envelope, d_envelope) = self.cutoff.evaluate(dist, with_derivative);
        let energy = phi.clone() * envelope.clone();
        let derivative = match (d_phi, d_envelope) {
            (Some(d_phi), Some(d_envelope)) => Some(d_phi * envelope + phi * d_envelope),
            _ => None,
        };
        (energy, derivative)
    }
}
