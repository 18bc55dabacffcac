use super::config::RbfKind;
use burn::prelude::*;
use burn::tensor::TensorData;
use std::f64::consts::PI;

/// A distance expansion evaluated on a column of pair distances.
///
/// All methods take distances shaped `[pairs, 1]` and return values shaped
/// `[pairs, num_rbf]`; the optional second output is the derivative with respect to
/// the distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialBasis {
    pub kind: RbfKind,
    pub num_rbf: usize,
    pub cutoff_lower: f64,
    pub cutoff_upper: f64,
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

fn row<B: Backend>(values: Vec<f64>, device: &B::Device) -> Tensor<B, 2> {
    let n = values.len();
    Tensor::<B, 1>::from_data(TensorData::new(values, [n]), device).unsqueeze::<2>()
}

impl RadialBasis {
    pub fn new(kind: RbfKind, num_rbf: usize, cutoff_lower: f64, cutoff_upper: f64) -> Self {
        Self {
            kind,
            num_rbf,
            cutoff_lower,
            cutoff_upper,
        }
    }

    pub fn evaluate<B: Backend>(
        &self,
        dist: Tensor<B, 2>,
        with_derivative: bool,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 2>>) {
        match self.kind {
            RbfKind::ExpNorm => self.expnorm(dist, with_derivative),
            RbfKind::Gauss => self.gauss(dist, with_derivative),
        }
    }

    fn expnorm<B: Backend>(
        &self,
        dist: Tensor<B, 2>,
        with_derivative: bool,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 2>>) {
        let device = dist.device();
        let span = self.cutoff_upper - self.cutoff_lower;
        let alpha = 5.0 / span;
        let start = (-span).exp();
        let beta = (2.0 / self.num_rbf as f64 * (1.0 - start)).powi(-2);
        let means = row::<B>(linspace(start, 1.0, self.num_rbf), &device);

        let t = dist.neg().add_scalar(self.cutoff_lower).mul_scalar(alpha).exp();
        let diff = t.clone() - means;
        let value = diff.clone().powf_scalar(2.0).mul_scalar(-beta).exp();

        let derivative = with_derivative
            .then(|| value.clone() * diff * t.mul_scalar(2.0 * beta * alpha));
        (value, derivative)
    }

    fn gauss<B: Backend>(
        &self,
        dist: Tensor<B, 2>,
        with_derivative: bool,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 2>>) {
        let device = dist.device();
        let offsets = linspace(self.cutoff_lower, self.cutoff_upper, self.num_rbf);
        let spacing = if self.num_rbf > 1 {
            offsets[1] - offsets[0]
        } else {
            self.cutoff_upper - self.cutoff_lower
        };
        let coeff = -0.5 / (spacing * spacing);

        let diff = dist - row::<B>(offsets, &device);
        let value = diff.clone().powf_scalar(2.0).mul_scalar(coeff).exp();

        let derivative = with_derivative.then(|| value.clone() * diff.mul_scalar(2.0 * coeff));
        (value, derivative)
    }
}

/// Smooth envelope that brings pair contributions to zero at the cutoff radii.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosineCutoff {
    pub cutoff_lower: f64,
    pub cutoff_upper: f64,
}

impl CosineCutoff {
    pub fn new(cutoff_lower: f64, cutoff_upper: f64) -> Self {
        Self {
            cutoff_lower,
            cutoff_upper,
        }
    }

    /// Evaluates the envelope on `[pairs, 1]` distances, optionally with its derivative.
    pub fn evaluate<B: Backend>(
        &self,
        dist: Tensor<B, 2>,
        with_derivative: bool,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 2>>) {
        if self.cutoff_lower > 0.0 {
            // Rises from zero at the lower radius and falls back to zero at the upper one.
            let span = self.cutoff_upper - self.cutoff_lower;
            let phase = dist
                .sub_scalar(self.cutoff_lower)
                .mul_scalar(2.0 * PI / span)
                .add_scalar(PI);
            let value = phase.clone().cos().add_scalar(1.0).mul_scalar(0.5);
            let derivative = with_derivative.then(|| phase.sin().mul_scalar(-PI / span));
            (value, derivative)
        } else {
            let phase = dist.mul_scalar(PI / self.cutoff_upper);
            let value = phase.clone().cos().add_scalar(1.0).mul_scalar(0.5);
            let derivative = with_derivative
                .then(|| phase.sin().mul_scalar(-0.5 * PI / self.cutoff_upper));
            (value, derivative)
        }
    }
}
