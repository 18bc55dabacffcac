use serde::{Deserialize, Serialize};
use tracing::warn;

const MIN_STD: f64 = 1e-12;

/// Mean and standard deviation of the energy target over the training split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: f64,
    pub std: f64,
}

impl Normalization {
    /// The statistics that leave predictions unscaled.
    pub fn identity() -> Self {
        Self {
            mean: 0.0,
            std: 1.0,
        }
    }

    /// Computes the sample mean and unbiased standard deviation of `energies`.
    ///
    /// A standard deviation below `1e-12` (including the single-sample case) falls back to
    /// 1 so that it can be used as a divisor.
    pub fn from_energies(energies: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = energies.into_iter().collect();
        if values.is_empty() {
            return Self::identity();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        if std < MIN_STD {
            warn!(
                std,
                samples = values.len(),
                "Training energies have no spread; using a standard deviation of 1."
            );
            return Self { mean, std: 1.0 };
        }
        Self { mean, std }
    }
}
