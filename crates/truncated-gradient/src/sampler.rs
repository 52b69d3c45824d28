//! Rejection sampling against a membership oracle
//!
//! Rounds run strictly one after another: each round sizes its proposals
//! against the pool accepted so far, and sampling stops with
//! `RejectionSamplingExhausted` once the round cap is reached.

use nalgebra::{DMatrix, DVector};
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use tracing::trace;
use truncated_core::{EstimatorConfig, Error, Result, SharedOracle};

/// Per-row conditional moments `E[z | z ∈ S]` and `E[z² | z ∈ S]`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalMoments {
    pub mean: DVector<f64>,
    pub second_moment: DVector<f64>,
}

/// Draws from a proposal distribution until the oracle accepts enough
#[derive(Debug, Clone)]
pub struct RejectionSampler {
    oracle: SharedOracle,
    num_samples: usize,
    max_rounds: usize,
}

impl RejectionSampler {
    pub fn new(oracle: SharedOracle, num_samples: usize, max_rounds: usize) -> Result<Self> {
        if num_samples == 0 || max_rounds == 0 {
            return Err(Error::invalid_hyperparameter(
                "rejection sampler",
                "num_samples and max_resample_rounds must be at least 1",
            ));
        }
        Ok(Self {
            oracle,
            num_samples,
            max_rounds,
        })
    }

    pub fn from_config(oracle: SharedOracle, config: &EstimatorConfig) -> Result<Self> {
        Self::new(oracle, config.num_samples(), config.max_resample_rounds())
    }

    pub fn oracle(&self) -> &SharedOracle {
        &self.oracle
    }

    /// `required` accepted draws from `N(loc, L Lᵀ)`, one per row
    ///
    /// `chol_lower` is the lower Cholesky factor of the covariance. Each
    /// round proposes `num_samples × required` draws.
    pub fn sample_normal(
        &self,
        loc: &DVector<f64>,
        chol_lower: &DMatrix<f64>,
        required: usize,
        rng: &mut dyn RngCore,
    ) -> Result<DMatrix<f64>> {
        let d = loc.len();
        if self.oracle.dim() != d {
            return Err(Error::shape_mismatch(self.oracle.dim(), d));
        }
        if chol_lower.nrows() != d || chol_lower.ncols() != d {
            return Err(Error::shape_mismatch(d, chol_lower.nrows()));
        }

        let mut accepted = DMatrix::zeros(required, d);
        let mut filled = 0;
        let proposals_per_round = self.num_samples * required;
        let mut noise = DVector::zeros(d);
        let mut draw = vec![0.0; d];

        for round in 1..=self.max_rounds {
            if filled == required {
                break;
            }
            for _ in 0..proposals_per_round {
                for value in noise.iter_mut() {
                    *value = StandardNormal.sample(rng);
                }
                let proposal = loc + chol_lower * &noise;
                draw.copy_from_slice(proposal.as_slice());
                if self.oracle.contains_row(&draw) {
                    accepted.row_mut(filled).copy_from(&proposal.transpose());
                    filled += 1;
                    if filled == required {
                        break;
                    }
                }
            }
            trace!(round, filled, required, "rejection sampling round");
        }

        if filled < required {
            return Err(Error::RejectionSamplingExhausted {
                accepted: filled,
                required,
                rounds: self.max_rounds,
            });
        }
        Ok(accepted)
    }

    /// Conditional moments of `N(mean[i], std²)` restricted to the oracle set
    ///
    /// Each round draws `num_samples` proposals for every row without an
    /// accepted draw yet; the estimate for a row averages all draws it has
    /// accepted. The oracle must be one-dimensional.
    pub fn truncated_moments(
        &self,
        mean: &DVector<f64>,
        std: f64,
        rng: &mut dyn RngCore,
    ) -> Result<ConditionalMoments> {
        if self.oracle.dim() != 1 {
            return Err(Error::shape_mismatch(1, self.oracle.dim()));
        }
        if !(std.is_finite() && std > 0.0) {
            return Err(Error::not_positive_definite("noise standard deviation"));
        }

        let n = mean.len();
        let mut sum = DVector::zeros(n);
        let mut sum_sq = DVector::zeros(n);
        let mut counts = vec![0usize; n];
        let mut pending: Vec<usize> = (0..n).collect();

        for round in 1..=self.max_rounds {
            if pending.is_empty() {
                break;
            }
            for &i in &pending {
                for _ in 0..self.num_samples {
                    let eps: f64 = StandardNormal.sample(rng);
                    let z = mean[i] + std * eps;
                    if self.oracle.contains_row(&[z]) {
                        sum[i] += z;
                        sum_sq[i] += z * z;
                        counts[i] += 1;
                    }
                }
            }
            pending.retain(|&i| counts[i] == 0);
            trace!(round, pending = pending.len(), rows = n, "rejection sampling round");
        }

        if !pending.is_empty() {
            return Err(Error::RejectionSamplingExhausted {
                accepted: n - pending.len(),
                required: n,
                rounds: self.max_rounds,
            });
        }

        let count = DVector::from_iterator(n, counts.iter().map(|&c| c as f64));
        Ok(ConditionalMoments {
            mean: sum.component_div(&count),
            second_moment: sum_sq.component_div(&count),
        })
    }
}
