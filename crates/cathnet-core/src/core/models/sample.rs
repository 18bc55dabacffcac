use nalgebra::Point3;

/// A borrowed view of one trajectory frame: the unit the dataset validates, splits and batches.
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    pub atomic_numbers: &'a [u8],
    /// Flattened `[atom][xyz]` coordinates in Angstroms.
    pub coords: &'a [f32],
    /// Flattened `[atom][xyz]` forces in kcal/mol/Angstrom.
    pub forces: &'a [f32],
    /// Potential energy in kcal/mol.
    pub energy: f32,
}

impl<'a> SampleView<'a> {
    pub fn num_atoms(&self) -> usize {
        self.atomic_numbers.len()
    }

    pub fn position(&self, atom: usize) -> Point3<f32> {
        let base = atom * 3;
        Point3::new(
            self.coords[base],
            self.coords[base + 1],
            self.coords[base + 2],
        )
    }

    pub fn positions(&self) -> Vec<Point3<f32>> {
        (0..self.num_atoms()).map(|i| self.position(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_unflatten_coordinates() {
        let z = [6u8, 8];
        let coords = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let forces = [0.0; 6];
        let view = SampleView {
            atomic_numbers: &z,
            coords: &coords,
            forces: &forces,
            energy: -1.5,
        };
        assert_eq!(view.num_atoms(), 2);
        assert_eq!(view.position(1), Point3::new(3.0, 4.0, 5.0));
        assert_eq!(view.positions().len(), 2);
    }
}
