//! Projection for truncated regression
//!
//! With a known noise variance the weight and bias are kept within `radius`
//! of the least-squares fit. With an unknown variance the variance is
//! clamped first, then the implied weight and bias are clamped and rebuilt
//! in inverse-variance units with the new `λ`.

use crate::radius::{variance_floor, Family};
use nalgebra::{DMatrix, DVector};
use tracing::trace;
use truncated_core::{
    Bounds, Error, EstimatorConfig, IterationHook, LinearModel, LinearUnknownVariance, Phase,
    RegressionMoments, Result,
};

fn scalar_bounds(center: f64, radius: f64) -> Result<Bounds> {
    Bounds::around(&DVector::from_element(1, center), radius, |_| None)
}

fn clamp_scalar(bounds: &Bounds, value: &mut f64) -> Result<usize> {
    bounds.clamp(std::slice::from_mut(value))
}

/// Post-step hook for [`LinearModel`] with known noise variance
#[derive(Debug, Clone, PartialEq)]
pub struct KnownVarianceProjection {
    radius: f64,
    weight_bounds: Bounds,
    bias_bounds: Option<Bounds>,
    clamp: bool,
}

impl KnownVarianceProjection {
    /// Bounds `emp ± r · (4 · ln(2/alpha) + 7)` around the least-squares fit
    pub fn new(moments: &RegressionMoments, config: &EstimatorConfig) -> Result<Self> {
        let radius = Family::RegressionKnownVariance.radius(config.alpha(), config.radius());
        let weight_bounds = Bounds::around(moments.weight(), radius, |_| None)?;
        let bias_bounds = moments
            .bias()
            .map(|bias| scalar_bounds(bias, radius))
            .transpose()?;
        Ok(Self {
            radius,
            weight_bounds,
            bias_bounds,
            clamp: config.clamp(),
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn weight_bounds(&self) -> &Bounds {
        &self.weight_bounds
    }

    pub fn bias_bounds(&self) -> Option<&Bounds> {
        self.bias_bounds.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.clamp
    }

    /// Clip weight and bias in place, returning how many entries moved
    pub fn project(&self, model: &mut LinearModel) -> Result<usize> {
        let mut weight = model.weight().clone();
        let mut moved = self.weight_bounds.clamp(weight.as_mut_slice())?;
        let bias = match (model.bias(), &self.bias_bounds) {
            (Some(mut bias), Some(bounds)) => {
                moved += clamp_scalar(bounds, &mut bias)?;
                Some(bias)
            }
            (None, None) => None,
            _ => {
                return Err(Error::invalid_hyperparameter(
                    "bias",
                    "model and projection disagree on fitting an intercept",
                ))
            }
        };
        if moved > 0 {
            *model = LinearModel::new(weight, bias);
            trace!(moved, "projected regression parameters");
        }
        Ok(moved)
    }
}

impl IterationHook<LinearModel> for KnownVarianceProjection {
    fn on_iteration(
        &self,
        model: &mut LinearModel,
        _iteration: usize,
        _phase: Phase,
        _input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
    ) -> Result<()> {
        if self.clamp {
            self.project(model)?;
        }
        Ok(())
    }
}

/// Post-step hook for [`LinearUnknownVariance`]
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownVarianceProjection {
    radius: f64,
    weight_bounds: Bounds,
    bias_bounds: Option<Bounds>,
    variance_bounds: Bounds,
    clamp: bool,
}

impl UnknownVarianceProjection {
    /// Bounds around the least-squares fit and its residual variance
    ///
    /// Weight and bias get `emp ± r · (12 + 4 · ln(2/alpha))`. The variance
    /// is kept in `[min(max(σ² alpha² / 12, σ² / r), σ² / alpha²), σ² / alpha²]`.
    pub fn new(moments: &RegressionMoments, config: &EstimatorConfig) -> Result<Self> {
        let alpha = config.alpha();
        let radius = Family::RegressionUnknownVariance.radius(alpha, config.radius());
        let weight_bounds = Bounds::around(moments.weight(), radius, |_| None)?;
        let bias_bounds = moments
            .bias()
            .map(|bias| scalar_bounds(bias, radius))
            .transpose()?;

        let emp_var = moments.noise_variance();
        let upper = emp_var / (alpha * alpha);
        let lower = variance_floor(alpha, emp_var)
            .max(emp_var / config.radius())
            .min(upper);
        if !(lower > 0.0) {
            return Err(Error::not_positive_definite("noise variance lower bound"));
        }
        let variance_bounds = Bounds::new(
            DVector::from_element(1, lower),
            DVector::from_element(1, upper),
        )?;

        Ok(Self {
            radius,
            weight_bounds,
            bias_bounds,
            variance_bounds,
            clamp: config.clamp(),
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn weight_bounds(&self) -> &Bounds {
        &self.weight_bounds
    }

    pub fn bias_bounds(&self) -> Option<&Bounds> {
        self.bias_bounds.as_ref()
    }

    pub fn variance_bounds(&self) -> &Bounds {
        &self.variance_bounds
    }

    pub fn is_active(&self) -> bool {
        self.clamp
    }

    /// Clip variance, then implied weight and bias, returning how many moved
    ///
    /// Fails with `NonPositiveDefiniteProjection` when `λ` has already left
    /// the positive half-line, since no variance can be recovered from it.
    pub fn project(&self, model: &mut LinearUnknownVariance) -> Result<usize> {
        let mut variance = model.variance()?;
        let mut weight = model.weight()?;
        let mut bias = model.bias()?;

        let mut moved = clamp_scalar(&self.variance_bounds, &mut variance)?;
        moved += self.weight_bounds.clamp(weight.as_mut_slice())?;
        match (bias.as_mut(), &self.bias_bounds) {
            (Some(bias), Some(bounds)) => moved += clamp_scalar(bounds, bias)?,
            (None, None) => {}
            _ => {
                return Err(Error::invalid_hyperparameter(
                    "bias",
                    "model and projection disagree on fitting an intercept",
                ))
            }
        }

        if moved > 0 {
            *model = LinearUnknownVariance::from_implied(&weight, bias, variance)?;
            trace!(moved, variance, "projected regression parameters");
        }
        Ok(moved)
    }
}

impl IterationHook<LinearUnknownVariance> for UnknownVarianceProjection {
    fn on_iteration(
        &self,
        model: &mut LinearUnknownVariance,
        _iteration: usize,
        _phase: Phase,
        _input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
    ) -> Result<()> {
        if self.clamp {
            self.project(model)?;
        }
        Ok(())
    }
}
