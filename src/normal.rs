//! Truncated multivariate normal estimation
//!
//! Only samples accepted by the oracle are ever observed. The fit starts at
//! the empirical moments of the observed sample and runs projected gradient
//! descent in natural parameters, with the oracle-based score as the descent
//! direction and the confidence region around the empirical moments as the
//! feasible set.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use truncated_core::{
    Criterion, Error, EstimatorConfig, MembershipOracle, NormalModel, NormalMoments, Result,
    SharedOracle,
};
use truncated_gradient::{ExpH, RejectionSampler, TruncatedNormalNll};
use truncated_projection::{Family, NormalProjection};
use truncated_train::{Loaders, TrainSummary, Trainer};

/// Fitted normal distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalFit {
    pub loc: DVector<f64>,
    pub covariance: DMatrix<f64>,
    /// Final natural parameters
    pub model: NormalModel,
    pub summary: TrainSummary,
}

/// Estimator for `N(μ, Σ)` observed only inside the oracle's region
#[derive(Debug, Clone)]
pub struct TruncatedNormal {
    oracle: SharedOracle,
    config: EstimatorConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl TruncatedNormal {
    pub fn new(oracle: SharedOracle, config: EstimatorConfig) -> Self {
        Self {
            oracle,
            config,
            stop: None,
        }
    }

    /// Abort the fit between iterations once `flag` is set
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Fit to an `n x d` matrix of observed samples
    ///
    /// Fails with `DegenerateMoments` on an empty or rank-deficient sample
    /// and with `InvalidShape` when `d` differs from the oracle dimension.
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
            Family::TruncatedNormal,
            |moments, sampler| Ok(TruncatedNormalNll::new(ExpH::new(moments), sampler)),
        )
    }
}

/// Shared pipeline of the normal-family estimators
pub(crate) fn fit_normal<C, F>(
    oracle: &SharedOracle,
    config: &EstimatorConfig,
    stop: Option<&Arc<AtomicBool>>,
    samples: &DMatrix<f64>,
    family: Family,
    build_criterion: F,
) -> Result<NormalFit>
where
    C: Criterion<NormalModel>,
    F: FnOnce(&NormalMoments, RejectionSampler) -> Result<C>,
{
    let moments = NormalMoments::from_samples(samples)?;
    check_oracle(oracle.as_ref(), samples)?;

    let mut model = NormalModel::from_moments(&moments)?;
    let projection = NormalProjection::new(family, &moments, config)?;
    let sampler = RejectionSampler::from_config(Arc::clone(oracle), config)?;
    let criterion = build_criterion(&moments, sampler)?;
    debug!(
        ?family,
        radius = projection.radius(),
        clamp = projection.is_active(),
        "initialized at empirical moments"
    );

    let mut rng = config.rng();
    let loaders = Loaders::split(samples.clone(), None, config, &mut rng)?;
    let mut trainer = Trainer::new(config);
    if let Some(flag) = stop {
        trainer = trainer.with_stop_flag(Arc::clone(flag));
    }
    let summary = trainer.train(&mut model, &loaders, &criterion, &projection, None, &mut rng)?;
    debug!(
        iterations = summary.iterations,
        loss = summary.final_loss,
        cancelled = summary.cancelled,
        "fit finished"
    );

    Ok(NormalFit {
        loc: model.loc()?,
        covariance: model.covariance()?,
        model,
        summary,
    })
}

fn check_oracle(oracle: &dyn MembershipOracle, samples: &DMatrix<f64>) -> Result<()> {
    if oracle.dim() != samples.ncols() {
        return Err(Error::shape_mismatch(oracle.dim(), samples.ncols()));
    }
    let outside = oracle
        .contains_batch(samples)?
        .into_iter()
        .filter(|inside| !inside)
        .count();
    if outside > 0 {
        warn!(outside, "observed samples fall outside the oracle region");
    }
    Ok(())
}
