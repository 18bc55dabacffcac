use crate::core::geometry::neighbors::{NeighborOverflow, build_pairs};
use crate::core::models::sample::SampleView;
use crate::model::config::PotentialConfig;
use burn::prelude::*;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    #[error("{source} (sample {sample} of the batch)")]
    NeighborOverflow {
        sample: usize,
        #[source]
        source: NeighborOverflow,
    },
    #[error("Atomic number {z} is outside the embedding table of size {max_z}")]
    UnsupportedElement { z: u8, max_z: usize },
    #[error("Batch has no samples")]
    Empty,
}

/// Graph construction parameters derived from the model hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSpec {
    pub cutoff_lower: f32,
    pub cutoff_upper: f32,
    pub max_num_neighbors: usize,
    pub max_z: usize,
}

impl From<&PotentialConfig> for GraphSpec {
    fn from(config: &PotentialConfig) -> Self {
        Self {
            cutoff_lower: config.cutoff_lower as f32,
            cutoff_upper: config.cutoff_upper as f32,
            max_num_neighbors: config.max_num_neighbors,
            max_z: config.max_z,
        }
    }
}

/// A host-side batch of molecular graphs with concatenated atoms.
///
/// Pair indices refer to atoms of the whole batch; each unordered pair appears once.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBatch {
    pub atomic_numbers: Vec<i64>,
    /// `[atom][xyz]`, Angstroms.
    pub positions: Vec<f32>,
    pub molecule_index: Vec<i64>,
    pub pair_i: Vec<i64>,
    pub pair_j: Vec<i64>,
    pub pair_molecule: Vec<i64>,
    pub energies: Vec<f32>,
    /// `[atom][xyz]`, kcal/mol/Angstrom.
    pub forces: Vec<f32>,
    pub num_molecules: usize,
}

impl GraphBatch {
    pub fn num_atoms(&self) -> usize {
        self.atomic_numbers.len()
    }

    pub fn num_pairs(&self) -> usize {
        self.pair_i.len()
    }

    /// Checks that every array agrees with the atom, pair and molecule counts.
    pub fn check(&self) -> Result<(), String> {
        let n = self.num_atoms();
        let p = self.num_pairs();
        let m = self.num_molecules;
        let lengths = [
            ("positions", self.positions.len(), 3 * n),
            ("forces", self.forces.len(), 3 * n),
            ("molecule_index", self.molecule_index.len(), n),
            ("pair_j", self.pair_j.len(), p),
            ("pair_molecule", self.pair_molecule.len(), p),
            ("energies", self.energies.len(), m),
        ];
        for (name, found, expected) in lengths {
            if found != expected {
                return Err(format!("{name} has {found} entries, expected {expected}"));
            }
        }
        let in_range = |values: &[i64], bound: usize| values.iter().all(|&v| v >= 0 && (v as usize) < bound);
        if !in_range(&self.molecule_index, m) || !in_range(&self.pair_molecule, m) {
            return Err("molecule index out of range".to_string());
        }
        if !in_range(&self.pair_i, n) || !in_range(&self.pair_j, n) {
            return Err("pair index out of range".to_string());
        }
        Ok(())
    }
}

/// Concatenates samples into one batch and builds their neighbor pairs.
///
/// # Errors
///
/// Fails if a sample has an atom with too many neighbors or an atomic number the
/// embedding table cannot represent.
pub fn collate(samples: &[SampleView<'_>], spec: &GraphSpec) -> Result<GraphBatch, BatchError> {
    if samples.is_empty() {
        return Err(BatchError::Empty);
    }
    let total_atoms: usize = samples.iter().map(|s| s.num_atoms()).sum();
    let mut batch = GraphBatch {
        atomic_numbers: Vec::with_capacity(total_atoms),
        positions: Vec::with_capacity(3 * total_atoms),
        molecule_index: Vec::with_capacity(total_atoms),
        pair_i: Vec::new(),
        pair_j: Vec::new(),
        pair_molecule: Vec::new(),
        energies: Vec::with_capacity(samples.len()),
        forces: Vec::with_capacity(3 * total_atoms),
        num_molecules: samples.len(),
    };

    let mut offset = 0usize;
    for (m, sample) in samples.iter().enumerate() {
        if let Some(&z) = sample.atomic_numbers.iter().find(|&&z| z as usize >= spec.max_z) {
            return Err(BatchError::UnsupportedElement {
                z,
                max_z: spec.max_z,
            });
        }
        let pairs = build_pairs(
            &sample.positions(),
            spec.cutoff_lower,
            spec.cutoff_upper,
            spec.max_num_neighbors,
        )
        .map_err(|source| BatchError::NeighborOverflow { sample: m, source })?;

        batch
            .atomic_numbers
            .extend(sample.atomic_numbers.iter().map(|&z| z as i64));
        batch.positions.extend_from_slice(sample.coords);
        batch.forces.extend_from_slice(sample.forces);
        batch
            .molecule_index
            .extend(std::iter::repeat_n(m as i64, sample.num_atoms()));
        batch.energies.push(sample.energy);

        for (i, j) in pairs {
            batch.pair_i.push((offset + i) as i64);
            batch.pair_j.push((offset + j) as i64);
            batch.pair_molecule.push(m as i64);
        }
        offset += sample.num_atoms();
    }
    Ok(batch)
}

/// A [`GraphBatch`] moved onto a device.
#[derive(Debug, Clone)]
pub struct GraphTensors<B: Backend> {
    /// `[atoms]`
    pub atomic_numbers: Tensor<B, 1, Int>,
    /// `[atoms, 3]`
    pub positions: Tensor<B, 2>,
    /// `[atoms]`
    pub molecule_index: Tensor<B, 1, Int>,
    /// `[pairs]`
    pub pair_i: Tensor<B, 1, Int>,
    /// `[pairs]`
    pub pair_j: Tensor<B, 1, Int>,
    /// `[pairs]`
    pub pair_molecule: Tensor<B, 1, Int>,
    /// `[molecules]`
    pub energies: Tensor<B, 1>,
    /// `[atoms, 3]`
    pub forces: Tensor<B, 2>,
    pub num_atoms: usize,
    pub num_pairs: usize,
    pub num_molecules: usize,
}

fn ints<B: Backend>(values: &[i64], device: &B::Device) -> Tensor<B, 1, Int> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

impl<B: Backend> GraphTensors<B> {
    pub fn from_batch(batch: &GraphBatch, device: &B::Device) -> Self {
        let n = batch.num_atoms();
        Self {
            atomic_numbers: ints(&batch.atomic_numbers, device),
            positions: Tensor::from_data(TensorData::new(batch.positions.clone(), [n, 3]), device),
            molecule_index: ints(&batch.molecule_index, device),
            pair_i: ints(&batch.pair_i, device),
            pair_j: ints(&batch.pair_j, device),
            pair_molecule: ints(&batch.pair_molecule, device),
            energies: Tensor::from_data(
                TensorData::new(batch.energies.clone(), [batch.num_molecules]),
                device,
            ),
            forces: Tensor::from_data(TensorData::new(batch.forces.clone(), [n, 3]), device),
            num_atoms: n,
            num_pairs: batch.num_pairs(),
            num_molecules: batch.num_molecules,
        }
    }

    /// The same graph with different positions, as used for differentiation.
    pub fn with_positions(&self, positions: Tensor<B, 2>) -> Self {
        Self {
            positions,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn spec() -> GraphSpec {
        GraphSpec {
            cutoff_lower: 0.0,
            cutoff_upper: 5.0,
            max_num_neighbors: 32,
            max_z: 20,
        }
    }

    #[test]
    fn collate_offsets_pair_indices_per_molecule() {
        let z = [6u8, 8, 1];
        let coords_a = [0.0, 0.0, 0.0, 1.2, 0.0, 0.0, 0.0, 1.0, 0.0];
        let coords_b = [0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0, 1.1, 0.0];
        let forces = [0.0; 9];
        let a = SampleView {
            atomic_numbers: &z,
            coords: &coords_a,
            forces: &forces,
            energy: -1.0,
        };
        let b = SampleView {
            atomic_numbers: &z,
            coords: &coords_b,
            forces: &forces,
            energy: -2.0,
        };

        let batch = collate(&[a, b], &spec()).unwrap();
        assert_eq!(batch.num_atoms(), 6);
        assert_eq!(batch.molecule_index, vec![0, 0, 0, 1, 1, 1]);
        // molecule a: all three pairs; molecule b: atom 4 is out of range of both others
        assert_eq!(batch.pair_i, vec![0, 0, 1, 3]);
        assert_eq!(batch.pair_j, vec![1, 2, 2, 5]);
        assert_eq!(batch.pair_molecule, vec![0, 0, 0, 1]);
        assert_eq!(batch.energies, vec![-1.0, -2.0]);
        assert!(batch.check().is_ok());
    }

    #[test]
    fn unsupported_element_is_rejected() {
        let z = [6u8, 26];
        let coords = [0.0, 0.0, 0.0, 1.2, 0.0, 0.0];
        let forces = [0.0; 6];
        let sample = SampleView {
            atomic_numbers: &z,
            coords: &coords,
            forces: &forces,
            energy: 0.0,
        };
        assert_eq!(
            collate(&[sample], &spec()).unwrap_err(),
            BatchError::UnsupportedElement { z: 26, max_z: 20 }
        );
    }

    #[test]
    fn crowded_sample_overflows() {
        let z = [6u8; 4];
        let coords = [
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
        ];
        let forces = [0.0; 12];
        let sample = SampleView {
            atomic_numbers: &z,
            coords: &coords,
            forces: &forces,
            energy: 0.0,
        };
        let tight = GraphSpec {
            max_num_neighbors: 2,
            ..spec()
        };
        assert!(matches!(
            collate(&[sample], &tight),
            Err(BatchError::NeighborOverflow { sample: 0, .. })
        ));
    }

    #[test]
    fn check_detects_out_of_range_pairs() {
        let mut batch = GraphBatch {
            atomic_numbers: vec![6, 8],
            positions: vec![0.0; 6],
            molecule_index: vec![0, 0],
            pair_i: vec![0],
            pair_j: vec![1],
            pair_molecule: vec![0],
            energies: vec![0.0],
            forces: vec![0.0; 6],
            num_molecules: 1,
        };
        assert!(batch.check().is_ok());
        batch.pair_j[0] = 2;
        assert!(batch.check().is_err());
        batch.pair_j[0] = 1;
        batch.energies.push(1.0);
        assert!(batch.check().is_err());
    }

    #[test]
    fn tensors_have_batch_shapes() {
        let batch = GraphBatch {
            atomic_numbers: vec![6, 8, 1],
            positions: vec![0.0; 9],
            molecule_index: vec![0, 0, 1],
            pair_i: vec![0],
            pair_j: vec![1],
            pair_molecule: vec![0],
            energies: vec![0.0, 1.0],
            forces: vec![0.0; 9],
            num_molecules: 2,
        };
        let tensors = GraphTensors::<NdArray<f32>>::from_batch(&batch, &Default::default());
        assert_eq!(tensors.positions.dims(), [3, 3]);
        assert_eq!(tensors.pair_i.dims(), [1]);
        assert_eq!(tensors.energies.dims(), [2]);
    }
}
