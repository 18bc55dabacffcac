use super::config::Activation;
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, softplus};
use std::f64::consts::LN_2;

impl Activation {
    /// Applies the nonlinearity to `x`, also returning `dy/dx` when requested.
    pub fn evaluate<B: Backend, const D: usize>(
        &self,
        x: Tensor<B, D>,
        with_derivative: bool,
    ) -> (Tensor<B, D>, Option<Tensor<B, D>>) {
        match self {
            Activation::Silu => {
                let s = sigmoid(x.clone());
                let y = x.clone() * s.clone();
                // s * (1 + x * (1 - s))
                let dy = with_derivative
                    .then(|| s.clone() * (x * s.neg().add_scalar(1.0)).add_scalar(1.0));
                (y, dy)
            }
            Activation::Tanh => {
                let y = x.tanh();
                let dy = with_derivative.then(|| y.clone().powf_scalar(2.0).neg().add_scalar(1.0));
                (y, dy)
            }
            Activation::Sigmoid => {
                let y = sigmoid(x);
                let dy = with_derivative.then(|| y.clone() * y.clone().neg().add_scalar(1.0));
                (y, dy)
            }
            Activation::Ssp => {
                let y = softplus(x.clone(), 1.0).sub_scalar(LN_2);
                let dy = with_derivative.then(|| sigmoid(x));
                (y, dy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f64>;

    fn input(values: &[f64]) -> Tensor<TestBackend, 1> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), &Default::default())
    }

    fn to_vec(t: Tensor<TestBackend, 1>) -> Vec<f64> {
        t.into_data().iter::<f64>().collect()
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let points = [-2.5, -0.3, 0.0, 0.7, 3.1];
        let h = 1e-6;
        for act in [
            Activation::Silu,
            Activation::Tanh,
            Activation::Ssp,
            Activation::Sigmoid,
        ] {
            let (_, dy) = act.evaluate(input(&points), true);
            let dy = to_vec(dy.unwrap());
            let up = to_vec(act.evaluate(input(&points.map(|p| p + h)), false).0);
            let down = to_vec(act.evaluate(input(&points.map(|p| p - h)), false).0);
            for i in 0..points.len() {
                let numeric = (up[i] - down[i]) / (2.0 * h);
                assert!(
                    (dy[i] - numeric).abs() < 1e-6,
                    "{act}: at x={} analytic {} vs numeric {}",
                    points[i],
                    dy[i],
                    numeric
                );
            }
        }
    }

    #[test]
    fn shifted_softplus_is_zero_at_origin() {
        let (y, _) = Activation::Ssp.evaluate(input(&[0.0]), false);
        assert!(to_vec(y)[0].abs() < 1e-12);
    }
}
