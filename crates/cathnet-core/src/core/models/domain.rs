use bincode::{Decode, Encode};

/// Atomic number of hydrogen, used to count heavy atoms.
const HYDROGEN: u8 = 1;

/// A single CATH domain with all of its simulated trajectories.
///
/// This mirrors the layout of an mdCATH source file: static per-domain attributes at the
/// top level, one group per simulation temperature, and one group per replica below that.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct DomainRecord {
    /// The CATH domain identifier (e.g., "1a0rP01").
    pub domain_id: String,
    /// Atomic numbers of the protein atoms, in topology order.
    pub atomic_numbers: Vec<u8>,
    /// Number of residues in the domain.
    pub num_residues: u32,
    /// Number of chains in the domain.
    pub num_chains: u32,
    /// Simulations grouped by temperature.
    pub temperatures: Vec<TemperatureRecord>,
}

/// All replicas simulated at one temperature.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct TemperatureRecord {
    /// Simulation temperature in kelvin.
    pub kelvin: u32,
    /// Independent replicas at this temperature.
    pub replicas: Vec<ReplicaRecord>,
}

/// One trajectory with its per-frame arrays and summary descriptors.
///
/// Per-frame arrays are stored flattened in row-major `[frame][atom][xyz]` order.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ReplicaRecord {
    /// Replica index within its temperature group.
    pub replica: u32,
    /// Number of stored frames.
    pub num_frames: u32,
    /// Coordinates in Angstroms, `num_frames * num_atoms * 3` values.
    pub coords: Vec<f32>,
    /// Forces in kcal/mol/Angstrom, `num_frames * num_atoms * 3` values.
    pub forces: Vec<f32>,
    /// Potential energies in kcal/mol, `num_frames` values.
    pub energies: Vec<f32>,
    /// Smallest radius of gyration along the trajectory, in Angstroms.
    pub min_gyration_radius: f32,
    /// Largest radius of gyration along the trajectory, in Angstroms.
    pub max_gyration_radius: f32,
    /// Mean fraction of residues in helical secondary structure.
    pub alpha: f32,
    /// Mean fraction of residues in strand secondary structure.
    pub beta: f32,
    /// Mean fraction of residues in coil.
    pub coil: f32,
    /// Largest neighbor count of any atom within 5 Angstroms over all frames.
    pub max_num_neighbors_5a: u32,
    /// Largest neighbor count of any atom within 9 Angstroms over all frames.
    pub max_num_neighbors_9a: u32,
}

impl DomainRecord {
    pub fn num_atoms(&self) -> usize {
        self.atomic_numbers.len()
    }

    pub fn num_heavy_atoms(&self) -> usize {
        self.atomic_numbers
            .iter()
            .filter(|&&z| z != HYDROGEN)
            .count()
    }

    pub fn temperature(&self, kelvin: u32) -> Option<&TemperatureRecord> {
        self.temperatures.iter().find(|t| t.kelvin == kelvin)
    }

    /// Total number of stored frames across all temperatures and replicas.
    pub fn total_frames(&self) -> usize {
        self.temperatures
            .iter()
            .flat_map(|t| t.replicas.iter())
            .map(|r| r.num_frames as usize)
            .sum()
    }
}

impl ReplicaRecord {
    /// Checks that the flattened arrays agree with `num_frames` and the atom count.
    ///
    /// # Errors
    ///
    /// Returns a description of the first inconsistent array.
    pub fn check_shapes(&self, num_atoms: usize) -> Result<(), String> {
        let frames = self.num_frames as usize;
        let expected_xyz = frames * num_atoms * 3;
        if self.coords.len() != expected_xyz {
            return Err(format!(
                "coords has {} values, expected {} ({} frames x {} atoms x 3)",
                self.coords.len(),
                expected_xyz,
                frames,
                num_atoms
            ));
        }
        if self.forces.len() != expected_xyz {
            return Err(format!(
                "forces has {} values, expected {}",
                self.forces.len(),
                expected_xyz
            ));
        }
        if self.energies.len() != frames {
            return Err(format!(
                "energies has {} values, expected {}",
                self.energies.len(),
                frames
            ));
        }
        Ok(())
    }

    pub fn frame_coords(&self, frame: usize, num_atoms: usize) -> &[f32] {
        let stride = num_atoms * 3;
        &self.coords[frame * stride..(frame + 1) * stride]
    }

    pub fn frame_forces(&self, frame: usize, num_atoms: usize) -> &[f32] {
        let stride = num_atoms * 3;
        &self.forces[frame * stride..(frame + 1) * stride]
    }
}
