//! Negative log-likelihood gradients for the normal family
//!
//! Both criteria step the natural parameters `T = Σ⁻¹` and `v = T μ`. With
//! sufficient statistic `t(x) = [−½ vec(x xᵀ), x]`, the gradient of the
//! truncated negative log-likelihood is `mean(t(z)) − mean(t(x))`, where `z`
//! are draws from the current candidate restricted to the oracle set. The
//! flattened layout is the `d²` precision entries followed by the `d` shift
//! entries.

use crate::exp_h::ExpH;
use crate::sampler::RejectionSampler;
use nalgebra::{DMatrix, DVector};
use rand::RngCore;
use truncated_core::linalg::{column_means, spd_cholesky};
use truncated_core::{Criterion, Error, Gradient, NormalModel, Result};

/// Score of the truncated normal likelihood, estimated by rejection sampling
fn natural_parameter_gradient(
    model: &NormalModel,
    input: &DMatrix<f64>,
    sampler: &RejectionSampler,
    rng: &mut dyn RngCore,
) -> Result<Gradient> {
    let d = model.dim();
    if input.ncols() != d {
        return Err(Error::shape_mismatch(d, input.ncols()));
    }
    let n = input.nrows();
    if n == 0 {
        return Ok(Gradient::new()
            .with(NormalModel::PRECISION, DVector::zeros(d * d))
            .with(NormalModel::SHIFT, DVector::zeros(d)));
    }

    let covariance = model.covariance()?;
    let loc = &covariance * model.shift();
    let chol = spd_cholesky(&covariance)
        .ok_or_else(|| Error::not_positive_definite("candidate covariance"))?;
    let draws = sampler.sample_normal(&loc, &chol, n, rng)?;

    let scale = 1.0 / n as f64;
    let precision_grad =
        (draws.transpose() * &draws - input.transpose() * input) * (-0.5 * scale);
    let shift_grad = column_means(&draws) - column_means(input);

    Ok(Gradient::new()
        .with(
            NormalModel::PRECISION,
            DVector::from_column_slice(precision_grad.as_slice()),
        )
        .with(NormalModel::SHIFT, shift_grad))
}

/// Censored normal negative log-likelihood
///
/// The loss value carries no information and is always zero; only the
/// gradient is meaningful.
#[derive(Debug, Clone)]
pub struct CensoredNormalNll {
    sampler: RejectionSampler,
}

impl CensoredNormalNll {
    pub fn new(sampler: RejectionSampler) -> Self {
        Self { sampler }
    }
}

impl Criterion<NormalModel> for CensoredNormalNll {
    fn evaluate(
        &self,
        _model: &NormalModel,
        _input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
    ) -> Result<f64> {
        Ok(0.0)
    }

    fn gradient(
        &self,
        model: &NormalModel,
        input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
        rng: &mut dyn RngCore,
    ) -> Result<Gradient> {
        natural_parameter_gradient(model, input, &self.sampler, rng)
    }
}

/// Truncated normal negative log-likelihood
///
/// Reports the batch mean of [`ExpH`] at the current natural parameters as
/// its loss value; the descent direction is the sampled score.
#[derive(Debug, Clone)]
pub struct TruncatedNormalNll {
    exp_h: ExpH,
    sampler: RejectionSampler,
}

impl TruncatedNormalNll {
    pub fn new(exp_h: ExpH, sampler: RejectionSampler) -> Self {
        Self { exp_h, sampler }
    }
}

impl Criterion<NormalModel> for TruncatedNormalNll {
    fn evaluate(
        &self,
        model: &NormalModel,
        input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
    ) -> Result<f64> {
        if input.nrows() == 0 {
            return Ok(0.0);
        }
        let values = self
            .exp_h
            .evaluate(model.shift(), model.precision(), input)?;
        Ok(values.mean())
    }

    fn gradient(
        &self,
        model: &NormalModel,
        input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
        rng: &mut dyn RngCore,
    ) -> Result<Gradient> {
        natural_parameter_gradient(model, input, &self.sampler, rng)
    }
}
