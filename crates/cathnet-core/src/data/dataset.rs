use super::validity::SampleValidator;
use crate::core::models::domain::{DomainRecord, ReplicaRecord};
use crate::core::models::sample::SampleView;
use crate::engine::config::{DatasetConfig, DatasetFilters};
use tracing::{debug, warn};

/// Location of one frame inside the loaded domain records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRef {
    pub domain: u32,
    pub temperature: u32,
    pub replica: u32,
    pub frame: u32,
}

/// Counts gathered while indexing the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Domains removed by the atom or residue filters.
    pub domains_filtered: usize,
    /// Replicas removed by the gyration radius or secondary structure filters.
    pub replicas_filtered: usize,
    /// Requested temperatures missing from a domain file.
    pub temperatures_missing: usize,
    /// Frames that passed the filters, valid or not.
    pub candidates: usize,
    /// Candidate frames rejected by the validator.
    pub excluded: usize,
}

/// The filtered, validated collection of frames a run draws its splits from.
#[derive(Debug)]
pub struct MdCathDataset {
    domains: Vec<DomainRecord>,
    samples: Vec<SampleRef>,
    summary: IndexSummary,
}

fn domain_passes(domain: &DomainRecord, filters: &DatasetFilters) -> bool {
    if filters.max_atoms.is_some_and(|max| domain.num_atoms() > max) {
        return false;
    }
    if filters
        .max_residues
        .is_some_and(|max| domain.num_residues as usize > max)
    {
        return false;
    }
    true
}

fn replica_passes(replica: &ReplicaRecord, filters: &DatasetFilters) -> bool {
    let below = |value: f32, limit: Option<f32>| limit.is_none_or(|max| value <= max);
    filters
        .min_gyration_radius
        .is_none_or(|min| replica.min_gyration_radius >= min)
        && below(replica.max_gyration_radius, filters.max_gyration_radius)
        && below(replica.alpha, filters.max_alpha)
        && below(replica.beta, filters.max_beta)
        && below(replica.coil, filters.max_coil)
}

impl MdCathDataset {
    /// Indexes every frame of `domains` that survives the configured filters and the
    /// validator, in domain, temperature, replica, frame order.
    pub fn index(
        domains: Vec<DomainRecord>,
        config: &DatasetConfig,
        validator: &dyn SampleValidator,
    ) -> Self {
        let mut samples = Vec::new();
        let mut summary = IndexSummary::default();

        for (d, domain) in domains.iter().enumerate() {
            if !domain_passes(domain, &config.filters) {
                debug!(domain = %domain.domain_id, "Domain removed by filters.");
                summary.domains_filtered += 1;
                continue;
            }
            let num_atoms = domain.num_atoms();

            for &kelvin in &config.temperatures {
                let Some((t, group)) = domain
                    .temperatures
                    .iter()
                    .enumerate()
                    .find(|(_, g)| g.kelvin == kelvin)
                else {
                    warn!(domain = %domain.domain_id, kelvin, "Temperature not present in domain file.");
                    summary.temperatures_missing += 1;
                    continue;
                };

                for (r, replica) in group.replicas.iter().enumerate() {
                    if !replica_passes(replica, &config.filters) {
                        summary.replicas_filtered += 1;
                        continue;
                    }
                    let frames: Vec<usize> = (0..replica.num_frames as usize)
                        .step_by(config.frame_stride)
                        .collect();
                    summary.candidates += frames.len();

                    if let Err(reason) = replica.check_shapes(num_atoms) {
                        debug!(domain = %domain.domain_id, kelvin, replica = replica.replica, %reason, "Replica arrays are inconsistent.");
                        summary.excluded += frames.len();
                        continue;
                    }

                    for frame in frames {
                        let view = SampleView {
                            atomic_numbers: &domain.atomic_numbers,
                            coords: replica.frame_coords(frame, num_atoms),
                            forces: replica.frame_forces(frame, num_atoms),
                            energy: replica.energies[frame],
                        };
                        match validator.check(&view) {
                            Ok(()) => samples.push(SampleRef {
                                domain: d as u32,
                                temperature: t as u32,
                                replica: r as u32,
                                frame: frame as u32,
                            }),
                            Err(reason) => {
                                debug!(domain = %domain.domain_id, kelvin, frame, %reason, "Frame excluded.");
                                summary.excluded += 1;
                            }
                        }
                    }
                }
            }
        }

        Self {
            domains,
            samples,
            summary,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    pub fn domains(&self) -> &[DomainRecord] {
        &self.domains
    }

    pub fn sample_ref(&self, index: usize) -> SampleRef {
        self.samples[index]
    }

    /// Borrows the frame at `index` (an index into the valid samples).
    pub fn sample(&self, index: usize) -> SampleView<'_> {
        let r = self.samples[index];
        let domain = &self.domains[r.domain as usize];
        let replica = &domain.temperatures[r.temperature as usize].replicas[r.replica as usize];
        let num_atoms = domain.num_atoms();
        let frame = r.frame as usize;
        SampleView {
            atomic_numbers: &domain.atomic_numbers,
            coords: replica.frame_coords(frame, num_atoms),
            forces: replica.frame_forces(frame, num_atoms),
            energy: replica.energies[frame],
        }
    }

    pub fn energy(&self, index: usize) -> f32 {
        self.sample(index).energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::domain::TemperatureRecord;
    use crate::data::validity::StructuralValidator;
    use crate::engine::config::fixtures::dataset_builder;
    use std::path::Path;

    fn replica(num_frames: u32, alpha: f32) -> ReplicaRecord {
        let mut coords = Vec::new();
        for f in 0..num_frames {
            coords.extend_from_slice(&[0.0, 0.0, 0.0, 1.5 + f as f32 * 0.01, 0.0, 0.0]);
        }
        ReplicaRecord {
            replica: 0,
            num_frames,
            forces: vec![0.1; coords.len()],
            coords,
            energies: (0..num_frames).map(|f| -(f as f32)).collect(),
            min_gyration_radius: 0.7,
            max_gyration_radius: 0.8,
            alpha,
            beta: 0.0,
            coil: 1.0 - alpha,
            max_num_neighbors_5a: 1,
            max_num_neighbors_9a: 1,
        }
    }

    fn domain(id: &str, replicas: Vec<ReplicaRecord>) -> DomainRecord {
        DomainRecord {
            domain_id: id.to_string(),
            atomic_numbers: vec![6, 8],
            num_residues: 1,
            num_chains: 1,
            temperatures: vec![TemperatureRecord {
                kelvin: 320,
                replicas,
            }],
        }
    }

    fn config(filters: DatasetFilters, stride: usize) -> DatasetConfig {
        dataset_builder(Path::new("/unused"))
            .frame_stride(stride)
            .filters(filters)
            .build()
            .unwrap()
    }

    #[test]
    fn stride_selects_every_nth_frame() {
        let dataset = MdCathDataset::index(
            vec![domain("1abcA00", vec![replica(5, 0.1)])],
            &config(DatasetFilters::default(), 2),
            &StructuralValidator::default(),
        );
        assert_eq!(dataset.len(), 3);
        let frames: Vec<u32> = (0..3).map(|i| dataset.sample_ref(i).frame).collect();
        assert_eq!(frames, vec![0, 2, 4]);
        assert_eq!(dataset.energy(1), -2.0);
    }

    #[test]
    fn invalid_frames_are_counted_not_kept() {
        let mut bad = replica(4, 0.1);
        bad.energies[1] = f32::NAN;
        bad.coords[3 * 2 * 2 + 3] = 0.05;
        let dataset = MdCathDataset::index(
            vec![domain("1abcA00", vec![bad])],
            &config(DatasetFilters::default(), 1),
            &StructuralValidator::default(),
        );
        assert_eq!(dataset.summary().candidates, 4);
        assert_eq!(dataset.summary().excluded, 2);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn inconsistent_replica_excludes_all_its_frames() {
        let mut broken = replica(4, 0.1);
        broken.forces.truncate(5);
        let dataset = MdCathDataset::index(
            vec![domain("1abcA00", vec![broken, replica(4, 0.1)])],
            &config(DatasetFilters::default(), 1),
            &StructuralValidator::default(),
        );
        assert_eq!(dataset.summary().excluded, 4);
        assert_eq!(dataset.len(), 4);
    }

    #[test]
    fn filters_remove_domains_and_replicas() {
        let filters = DatasetFilters {
            max_alpha: Some(0.5),
            ..Default::default()
        };
        let dataset = MdCathDataset::index(
            vec![
                domain("1abcA00", vec![replica(2, 0.9), replica(2, 0.2)]),
                domain("2defB00", vec![replica(2, 0.2)]),
            ],
            &config(filters, 1),
            &StructuralValidator::default(),
        );
        assert_eq!(dataset.summary().replicas_filtered, 1);
        assert_eq!(dataset.len(), 4);

        let filters = DatasetFilters {
            max_atoms: Some(1),
            ..Default::default()
        };
        let dataset = MdCathDataset::index(
            vec![domain("1abcA00", vec![replica(2, 0.2)])],
            &config(filters, 1),
            &StructuralValidator::default(),
        );
        assert_eq!(dataset.summary().domains_filtered, 1);
        assert!(dataset.is_empty());
    }

    #[test]
    fn missing_temperature_is_counted() {
        let dataset = MdCathDataset::index(
            vec![domain("1abcA00", vec![replica(2, 0.2)])],
            &dataset_builder(Path::new("/unused"))
                .temperatures(vec![320, 450])
                .build()
                .unwrap(),
            &StructuralValidator::default(),
        );
        assert_eq!(dataset.summary().temperatures_missing, 1);
        assert_eq!(dataset.len(), 2);
    }
}
