use crate::core::geometry::neighbors::closest_contact;
use crate::core::models::sample::SampleView;
use std::fmt;

/// Default closest allowed interatomic distance, in Angstroms.
pub const DEFAULT_MIN_CONTACT: f32 = 0.5;

/// Why a frame was excluded from the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Array lengths disagree with the atom count.
    Shape(String),
    /// A coordinate, force or energy is NaN or infinite.
    NonFinite(&'static str),
    /// Two atoms overlap.
    Clash { distance: f32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Shape(message) => write!(f, "inconsistent shape: {message}"),
            Rejection::NonFinite(field) => write!(f, "non-finite {field}"),
            Rejection::Clash { distance } => write!(f, "atoms {distance:.3} A apart"),
        }
    }
}

/// Decides whether a frame may enter the dataset.
///
/// Excluded frames are counted by the caller and reported once; a rejection is never fatal.
pub trait SampleValidator: Send + Sync {
    fn check(&self, sample: &SampleView<'_>) -> Result<(), Rejection>;
}

/// Structural checks: consistent array lengths, finite values, and no atom pair closer
/// than `min_contact`.
#[derive(Debug, Clone, Copy)]
pub struct StructuralValidator {
    pub min_contact: f32,
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self {
            min_contact: DEFAULT_MIN_CONTACT,
        }
    }
}

impl SampleValidator for StructuralValidator {
    fn check(&self, sample: &SampleView<'_>) -> Result<(), Rejection> {
        let expected = sample.num_atoms() * 3;
        if sample.coords.len() != expected || sample.forces.len() != expected {
            return Err(Rejection::Shape(format!(
                "{} atoms but {} coordinates and {} forces",
                sample.num_atoms(),
                sample.coords.len(),
                sample.forces.len()
            )));
        }
        if !sample.energy.is_finite() {
            return Err(Rejection::NonFinite("energy"));
        }
        if sample.coords.iter().any(|v| !v.is_finite()) {
            return Err(Rejection::NonFinite("coordinates"));
        }
        if sample.forces.iter().any(|v| !v.is_finite()) {
            return Err(Rejection::NonFinite("forces"));
        }
        if let Some(distance) = closest_contact(&sample.positions(), self.min_contact) {
            return Err(Rejection::Clash { distance });
        }
        Ok(())
    }
}
