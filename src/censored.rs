//! Censored multivariate normal estimation
//!
//! Same pipeline as [`TruncatedNormal`](crate::TruncatedNormal) with the
//! censored-normal radius `r · ln(1/alpha) / alpha²` and a criterion whose
//! reported loss is always zero; only its gradient drives the fit.

use crate::normal::{fit_normal, NormalFit};
use nalgebra::DMatrix;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::instrument;
use truncated_core::{EstimatorConfig, Result, SharedOracle};
use truncated_gradient::CensoredNormalNll;
use truncated_projection::Family;

/// Estimator for `N(μ, Σ)` from the by-value records of a censored sample
#[derive(Debug, Clone)]
pub struct CensoredNormal {
    oracle: SharedOracle,
    config: EstimatorConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl CensoredNormal {
    pub fn new(oracle: SharedOracle, config: EstimatorConfig) -> Self {
        Self {
            oracle,
            config,
            stop: None,
        }
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Fit to the `n x d` matrix of samples recorded by value
    #[instrument(
        skip_all,
        fields(n = samples.nrows(), dim = samples.ncols(), alpha = self.config.alpha())
    )]
    pub fn fit(&self, samples: &DMatrix<f64>) -> Result<NormalFit> {
        fit_normal(
            &self.oracle,
            &self.config,
            self.stop.as_ref(),
            samples,
            Family::CensoredNormal,
            |_, sampler| Ok(CensoredNormalNll::new(sampler)),
        )
    }
}
