//! Truncated linear regression
//!
//! Responses are observed only when the oracle accepts them. With a known
//! noise variance the weight and bias are learned directly; otherwise the
//! model is learned in inverse-variance units `(v, v0, λ)` and `λ` is
//! stepped at the separate variance learning rate.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, instrument};
use truncated_core::{
    Error, EstimatorConfig, LinearModel, LinearUnknownVariance, RegressionMoments, Result,
    SharedOracle,
};
use truncated_gradient::{RejectionSampler, TruncatedMse, TruncatedUnknownVarianceMse};
use truncated_projection::{KnownVarianceProjection, UnknownVarianceProjection};
use truncated_train::{Loaders, ParamGroup, TrainSummary, Trainer};

/// Whether the noise variance is given or learned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoiseVariance {
    Known(f64),
    Unknown,
}

/// Parameters as they were learned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegressionModel {
    Known(LinearModel),
    Unknown(LinearUnknownVariance),
}

/// Fitted regression in natural units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFit {
    pub weight: DVector<f64>,
    pub bias: Option<f64>,
    /// The given variance, or `1 / λ` when it was learned
    pub noise_variance: f64,
    pub model: RegressionModel,
    pub summary: TrainSummary,
}

/// Estimator for `y = x·w + w0 + ε` with responses truncated by the oracle
#[derive(Debug, Clone)]
pub struct TruncatedRegression {
    oracle: SharedOracle,
    config: EstimatorConfig,
    fit_bias: bool,
    noise: NoiseVariance,
    stop: Option<Arc<AtomicBool>>,
}

impl TruncatedRegression {
    /// Intercept fitted, noise variance learned
    pub fn new(oracle: SharedOracle, config: EstimatorConfig) -> Self {
        Self {
            oracle,
            config,
            fit_bias: true,
            noise: NoiseVariance::Unknown,
            stop: None,
        }
    }

    pub fn with_bias(mut self, fit_bias: bool) -> Self {
        self.fit_bias = fit_bias;
        self
    }

    /// Fails with `InvalidHyperparameters` for a non-positive or non-finite known variance
    pub fn with_noise_variance(mut self, noise: NoiseVariance) -> Result<Self> {
        if let NoiseVariance::Known(variance) = noise {
            if !(variance.is_finite() && variance > 0.0) {
                return Err(Error::invalid_hyperparameter(
                    "noise_variance",
                    &format!("known variance {variance} must be positive and finite"),
                ));
            }
        }
        self.noise = noise;
        Ok(self)
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn noise_variance(&self) -> NoiseVariance {
        self.noise
    }

    /// Fit to features `x` (`n x d`) and observed responses `y` (`n x 1`)
    #[instrument(
        skip_all,
        fields(n = x.nrows(), dim = x.ncols(), alpha = self.config.alpha(), noise = ?self.noise)
    )]
    pub fn fit(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<RegressionFit> {
        if self.oracle.dim() != 1 {
            return Err(Error::shape_mismatch(1, self.oracle.dim()));
        }
        let moments = RegressionMoments::from_samples(x, y, self.fit_bias)?;
        debug!(
            ols_variance = moments.noise_variance(),
            "initialized at least-squares fit"
        );

        let sampler = RejectionSampler::from_config(Arc::clone(&self.oracle), &self.config)?;
        let mut rng = self.config.rng();
        let loaders = Loaders::split(x.clone(), Some(y.clone()), &self.config, &mut rng)?;
        let mut trainer = Trainer::new(&self.config);
        if let Some(flag) = &self.stop {
            trainer = trainer.with_stop_flag(Arc::clone(flag));
        }

        let fit = match self.noise {
            NoiseVariance::Known(variance) => {
                let mut model = LinearModel::from_moments(&moments);
                let projection = KnownVarianceProjection::new(&moments, &self.config)?;
                let criterion = TruncatedMse::new(sampler, variance)?;
                let summary =
                    trainer.train(&mut model, &loaders, &criterion, &projection, None, &mut rng)?;
                RegressionFit {
                    weight: model.weight().clone(),
                    bias: model.bias(),
                    noise_variance: variance,
                    model: RegressionModel::Known(model),
                    summary,
                }
            }
            NoiseVariance::Unknown => {
                let mut model = LinearUnknownVariance::from_moments(&moments);
                let projection = UnknownVarianceProjection::new(&moments, &self.config)?;
                let criterion = TruncatedUnknownVarianceMse::new(sampler);
                let mut groups = vec![ParamGroup::new(LinearUnknownVariance::V)];
                if self.fit_bias {
                    groups.push(ParamGroup::new(LinearUnknownVariance::V0));
                }
                groups.push(ParamGroup::with_learning_rate(
                    LinearUnknownVariance::LAMBDA,
                    self.config.variance_learning_rate(),
                ));
                let summary = trainer.train(
                    &mut model,
                    &loaders,
                    &criterion,
                    &projection,
                    Some(&groups),
                    &mut rng,
                )?;
                RegressionFit {
                    weight: model.weight()?,
                    bias: model.bias()?,
                    noise_variance: model.variance()?,
                    model: RegressionModel::Unknown(model),
                    summary,
                }
            }
        };
        debug!(
            iterations = fit.summary.iterations,
            noise_variance = fit.noise_variance,
            cancelled = fit.summary.cancelled,
            "fit finished"
        );
        Ok(fit)
    }
}
