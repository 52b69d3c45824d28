//! Regression comparison sweep
//!
//! For every trial and every noise variance `1..=max_variance` a random
//! ground-truth linear model is drawn, its responses are truncated by a
//! [`Left`] oracle at `threshold`, and three estimates are compared against
//! the truth: ordinary least squares on the observed sample, truncated
//! regression with the least-squares residual variance taken as known, and
//! truncated regression with the variance learned.
//!
//! Jobs share nothing but the read-only settings. With the `parallel`
//! feature they run on the rayon thread pool.

use crate::regression::{NoiseVariance, TruncatedRegression};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use truncated_core::{
    Error, EstimatorConfig, Left, MembershipOracle, RegressionMoments, Result, SharedOracle,
};

/// Settings of one sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub trials: usize,
    /// Noise variances `1..=max_variance` are swept
    pub max_variance: usize,
    /// Responses at or below this value are never observed
    pub threshold: f64,
    /// Samples drawn before truncation
    pub samples: usize,
    pub dims: usize,
    pub fit_bias: bool,
    /// Ground-truth weights and bias are uniform in this range
    pub parameter_range: (f64, f64),
    /// Features are uniform in this range
    pub feature_range: (f64, f64),
    pub seed: u64,
    /// Template for every fit; `alpha` is replaced by the observed fraction
    pub config: EstimatorConfig,
}

impl SweepSettings {
    pub fn new(dims: usize, config: EstimatorConfig) -> Self {
        Self {
            trials: 10,
            max_variance: 20,
            threshold: 0.0,
            samples: 10_000,
            dims,
            fit_bias: true,
            parameter_range: (-1.0, 1.0),
            feature_range: (-5.0, 5.0),
            seed: 0,
            config,
        }
    }

    fn validate(&self) -> Result<()> {
        let counts = [
            ("trials", self.trials),
            ("max_variance", self.max_variance),
            ("samples", self.samples),
            ("dims", self.dims),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(Error::invalid_hyperparameter(name, "must be at least 1"));
            }
        }
        for (name, (lo, hi)) in [
            ("parameter_range", self.parameter_range),
            ("feature_range", self.feature_range),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(Error::invalid_hyperparameter(
                    name,
                    &format!("[{lo}, {hi}) is not a finite non-empty range"),
                ));
            }
        }
        if !self.threshold.is_finite() {
            return Err(Error::invalid_hyperparameter("threshold", "must be finite"));
        }
        Ok(())
    }
}

/// Errors of one (trial, variance) job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub trial: usize,
    pub variance: f64,
    /// Observed fraction, used as the survival bound of both truncated fits
    pub alpha: f64,
    pub ols_param_mse: f64,
    pub ols_var_mse: f64,
    pub known_param_mse: f64,
    pub unknown_param_mse: f64,
    pub unknown_var_mse: f64,
}

/// Run every job, failing on the first error
#[instrument(
    skip_all,
    fields(trials = settings.trials, max_variance = settings.max_variance, n = settings.samples)
)]
pub fn run_sweep(settings: &SweepSettings) -> Result<Vec<SweepRecord>> {
    settings.validate()?;
    let jobs: Vec<(usize, usize)> = (0..settings.trials)
        .flat_map(|trial| (1..=settings.max_variance).map(move |variance| (trial, variance)))
        .collect();

    #[cfg(feature = "parallel")]
    let records: Result<Vec<_>> = jobs
        .par_iter()
        .map(|&(trial, variance)| run_job(settings, trial, variance))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let records: Result<Vec<_>> = jobs
        .iter()
        .map(|&(trial, variance)| run_job(settings, trial, variance))
        .collect();
    records
}

fn run_job(settings: &SweepSettings, trial: usize, variance: usize) -> Result<SweepRecord> {
    let mut rng = StdRng::seed_from_u64(settings.seed ^ ((trial as u64) << 32 | variance as u64));
    let (lo, hi) = settings.parameter_range;
    let parameter = Uniform::new(lo, hi);
    let (lo, hi) = settings.feature_range;
    let feature = Uniform::new(lo, hi);
    let noise = Normal::new(0.0, (variance as f64).sqrt())
        .map_err(|e| Error::Computation(format!("noise distribution: {e}")))?;

    let weight = DVector::from_fn(settings.dims, |_, _| parameter.sample(&mut rng));
    let bias = settings.fit_bias.then(|| parameter.sample(&mut rng));
    let x = DMatrix::from_fn(settings.samples, settings.dims, |_, _| feature.sample(&mut rng));
    let mut y = &x * &weight;
    for value in y.iter_mut() {
        *value += bias.unwrap_or(0.0) + noise.sample(&mut rng);
    }

    let oracle = Left::scalar(settings.threshold);
    let kept: Vec<usize> = (0..y.len()).filter(|&i| oracle.contains_row(&[y[i]])).collect();
    let alpha = kept.len() as f64 / settings.samples as f64;
    let x_obs = x.select_rows(kept.iter());
    let y_obs = DMatrix::from_fn(kept.len(), 1, |i, _| y[kept[i]]);

    let ols = RegressionMoments::from_samples(&x_obs, &y_obs, settings.fit_bias)?;
    let config = settings.config.with_alpha(alpha)?;
    let oracle: SharedOracle = Arc::new(oracle);

    let known = TruncatedRegression::new(Arc::clone(&oracle), config.clone())
        .with_bias(settings.fit_bias)
        .with_noise_variance(NoiseVariance::Known(ols.noise_variance()))?
        .fit(&x_obs, &y_obs)?;
    let unknown = TruncatedRegression::new(oracle, config)
        .with_bias(settings.fit_bias)
        .fit(&x_obs, &y_obs)?;

    let truth = stack(&weight, bias);
    let variance = variance as f64;
    let record = SweepRecord {
        trial,
        variance,
        alpha,
        ols_param_mse: mse(&stack(ols.weight(), ols.bias()), &truth),
        ols_var_mse: (ols.noise_variance() - variance).powi(2),
        known_param_mse: mse(&stack(&known.weight, known.bias), &truth),
        unknown_param_mse: mse(&stack(&unknown.weight, unknown.bias), &truth),
        unknown_var_mse: (unknown.noise_variance - variance).powi(2),
    };
    debug!(
        trial,
        variance,
        alpha,
        ols = record.ols_param_mse,
        known = record.known_param_mse,
        unknown = record.unknown_param_mse,
        "sweep job finished"
    );
    Ok(record)
}

/// Weights followed by the bias, if any
fn stack(weight: &DVector<f64>, bias: Option<f64>) -> DVector<f64> {
    DVector::from_iterator(weight.len() + bias.is_some() as usize, weight.iter().copied().chain(bias))
}

fn mse(estimate: &DVector<f64>, truth: &DVector<f64>) -> f64 {
    (estimate - truth).norm_squared() / truth.len() as f64
}
