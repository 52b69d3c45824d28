//! Truncated regression criteria
//!
//! The response `y` is observed only when the oracle accepts it. For each row
//! the gradient replaces the untruncated prediction with the conditional
//! mean `E[z | z ∈ S]` of the current candidate, estimated by rejection
//! sampling.

use crate::sampler::RejectionSampler;
use nalgebra::{DMatrix, DVector, DVectorSlice};
use rand::RngCore;
use truncated_core::{Criterion, Error, Gradient, LinearModel, LinearUnknownVariance, Result};

/// Response column of a regression batch, shape-checked against `input`
fn response<'a>(
    input: &DMatrix<f64>,
    target: Option<&'a DMatrix<f64>>,
) -> Result<DVectorSlice<'a, f64>> {
    let target = target.ok_or_else(|| {
        Error::invalid_hyperparameter("target", "regression criteria require responses")
    })?;
    if target.ncols() != 1 {
        return Err(Error::shape_mismatch(1, target.ncols()));
    }
    if target.nrows() != input.nrows() {
        return Err(Error::shape_mismatch(input.nrows(), target.nrows()));
    }
    Ok(target.column(0))
}

fn half_mean_squared_error(prediction: &DVector<f64>, y: &DVectorSlice<'_, f64>) -> f64 {
    if prediction.is_empty() {
        return 0.0;
    }
    0.5 * (prediction - y).norm_squared() / prediction.len() as f64
}

/// Weight and optional bias gradients from per-row residuals
fn linear_gradient(
    input: &DMatrix<f64>,
    residual: &DVector<f64>,
    weight_name: &'static str,
    bias_name: Option<&'static str>,
) -> Gradient {
    let n = residual.len().max(1) as f64;
    let mut gradient = Gradient::new().with(weight_name, input.transpose() * residual / n);
    if let Some(name) = bias_name {
        gradient.push(name, DVector::from_element(1, residual.sum() / n));
    }
    gradient
}

/// Truncated least squares with a known noise variance
#[derive(Debug, Clone)]
pub struct TruncatedMse {
    sampler: RejectionSampler,
    noise_variance: f64,
}

impl TruncatedMse {
    pub fn new(sampler: RejectionSampler, noise_variance: f64) -> Result<Self> {
        if !(noise_variance.is_finite() && noise_variance > 0.0) {
            return Err(Error::invalid_hyperparameter(
                "noise variance",
                &format!("{noise_variance} must be positive and finite"),
            ));
        }
        Ok(Self {
            sampler,
            noise_variance,
        })
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }
}

impl Criterion<LinearModel> for TruncatedMse {
    fn evaluate(
        &self,
        model: &LinearModel,
        input: &DMatrix<f64>,
        target: Option<&DMatrix<f64>>,
    ) -> Result<f64> {
        let y = response(input, target)?;
        Ok(half_mean_squared_error(&model.predict(input)?, &y))
    }

    fn gradient(
        &self,
        model: &LinearModel,
        input: &DMatrix<f64>,
        target: Option<&DMatrix<f64>>,
        rng: &mut dyn RngCore,
    ) -> Result<Gradient> {
        let y = response(input, target)?;
        let prediction = model.predict(input)?;
        let moments = self
            .sampler
            .truncated_moments(&prediction, self.noise_variance.sqrt(), rng)?;
        let residual = moments.mean - y;
        let bias = model.bias().map(|_| LinearModel::BIAS);
        Ok(linear_gradient(input, &residual, LinearModel::WEIGHT, bias))
    }
}

/// Truncated least squares with the noise variance learned alongside
///
/// Works in inverse-variance units: `z ~ N((x·v + v0) / λ, 1 / λ)`.
#[derive(Debug, Clone)]
pub struct TruncatedUnknownVarianceMse {
    sampler: RejectionSampler,
}

impl TruncatedUnknownVarianceMse {
    pub fn new(sampler: RejectionSampler) -> Self {
        Self { sampler }
    }
}

impl Criterion<LinearUnknownVariance> for TruncatedUnknownVarianceMse {
    fn evaluate(
        &self,
        model: &LinearUnknownVariance,
        input: &DMatrix<f64>,
        target: Option<&DMatrix<f64>>,
    ) -> Result<f64> {
        let y = response(input, target)?;
        Ok(half_mean_squared_error(&model.predict(input)?, &y))
    }

    fn gradient(
        &self,
        model: &LinearUnknownVariance,
        input: &DMatrix<f64>,
        target: Option<&DMatrix<f64>>,
        rng: &mut dyn RngCore,
    ) -> Result<Gradient> {
        let y = response(input, target)?;
        let variance = model.variance()?;
        let prediction = model.predict(input)?;
        let moments = self
            .sampler
            .truncated_moments(&prediction, variance.sqrt(), rng)?;

        let residual = &moments.mean - &y;
        let v0 = model.v0().map(|_| LinearUnknownVariance::V0);
        let mut gradient = linear_gradient(input, &residual, LinearUnknownVariance::V, v0);

        let n = y.len().max(1) as f64;
        let lambda_grad = 0.5 * (y.norm_squared() - moments.second_moment.sum()) / n;
        gradient.push(LinearUnknownVariance::LAMBDA, DVector::from_element(1, lambda_grad));
        Ok(gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, StandardNormal};
    use std::sync::Arc;
    use truncated_core::{Identity, Left};

    fn linear_data(n: usize, seed: u64) -> (DMatrix<f64>, DMatrix<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let x = DMatrix::from_fn(n, 1, |_, _| StandardNormal.sample(&mut rng));
        let y = DMatrix::from_fn(n, 1, |i, _| {
            let noise: f64 = StandardNormal.sample(&mut rng);
            2.0 * x[(i, 0)] + 0.5 + noise
        });
        (x, y)
    }

    #[test]
    fn test_identity_oracle_reduces_to_least_squares_gradient() {
        let (x, y) = linear_data(200, 1);
        let model = LinearModel::new(DVector::from_vec(vec![1.0]), Some(0.0));
        let sampler = RejectionSampler::new(Arc::new(Identity::new(1)), 4000, 1).unwrap();
        let criterion = TruncatedMse::new(sampler, 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let gradient = criterion.gradient(&model, &x, Some(&y), &mut rng).unwrap();

        let residual = model.predict(&x).unwrap() - y.column(0);
        let n = x.nrows() as f64;
        let expected_weight = (x.transpose() * &residual / n)[0];
        let expected_bias = residual.sum() / n;
        assert_relative_eq!(gradient.get("weight").unwrap()[0], expected_weight, epsilon = 0.02);
        assert_relative_eq!(gradient.get("bias").unwrap()[0], expected_bias, epsilon = 0.02);
    }

    #[test]
    fn test_evaluate_is_half_mse() {
        let x = DMatrix::from_column_slice(2, 1, &[1.0, 2.0]);
        let y = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let model = LinearModel::new(DVector::from_vec(vec![1.0]), None);
        let sampler = RejectionSampler::new(Arc::new(Identity::new(1)), 1, 1).unwrap();
        let criterion = TruncatedMse::new(sampler, 1.0).unwrap();
        // residuals 0 and 1
        assert_relative_eq!(criterion.evaluate(&model, &x, Some(&y)).unwrap(), 0.25);
    }

    #[test]
    fn test_truncation_pushes_conditional_mean_up() {
        // every row predicts 0 under truncation z > 0, so E z = sqrt(2/π)
        let x = DMatrix::from_element(100, 1, 0.0);
        let y = DMatrix::from_element(100, 1, 0.0);
        let model = LinearModel::new(DVector::from_vec(vec![1.0]), Some(0.0));
        let sampler = RejectionSampler::new(Arc::new(Left::scalar(0.0)), 100, 100).unwrap();
        let criterion = TruncatedMse::new(sampler, 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let gradient = criterion.gradient(&model, &x, Some(&y), &mut rng).unwrap();
        let expected = (2.0 / std::f64::consts::PI).sqrt();
        assert_relative_eq!(gradient.get("bias").unwrap()[0], expected, epsilon = 0.05);
        assert_relative_eq!(gradient.get("weight").unwrap()[0], 0.0);
    }

    #[test]
    fn test_unknown_variance_gradient_groups() {
        let (x, y) = linear_data(200, 4);
        let model =
            LinearUnknownVariance::from_implied(&DVector::from_vec(vec![2.0]), Some(0.5), 1.0)
                .unwrap();
        let sampler = RejectionSampler::new(Arc::new(Identity::new(1)), 4000, 1).unwrap();
        let criterion = TruncatedUnknownVarianceMse::new(sampler);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let gradient = criterion.gradient(&model, &x, Some(&y), &mut rng).unwrap();

        let names: Vec<_> = gradient.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["v", "v0", "lambda"]);

        // identity oracle: E z² = ŷ² + σ²
        let prediction = model.predict(&x).unwrap();
        let expected_lambda = 0.5
            * (y.column(0).norm_squared()
                - prediction.iter().map(|p| p * p + 1.0).sum::<f64>())
            / x.nrows() as f64;
        assert_relative_eq!(
            gradient.get("lambda").unwrap()[0],
            expected_lambda,
            epsilon = 0.05
        );
    }

    #[test]
    fn test_missing_or_misshapen_targets() {
        let x = DMatrix::from_element(3, 1, 0.0);
        let model = LinearModel::new(DVector::from_vec(vec![1.0]), None);
        let sampler = RejectionSampler::new(Arc::new(Identity::new(1)), 1, 1).unwrap();
        let criterion = TruncatedMse::new(sampler.clone(), 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(6);

        assert!(matches!(
            criterion.gradient(&model, &x, None, &mut rng),
            Err(Error::InvalidHyperparameters(_))
        ));
        let y = DMatrix::from_element(2, 1, 0.0);
        assert!(matches!(
            criterion.evaluate(&model, &x, Some(&y)),
            Err(Error::InvalidShape { expected: 3, actual: 2 })
        ));
        assert!(TruncatedMse::new(sampler, -1.0).is_err());
    }
}
