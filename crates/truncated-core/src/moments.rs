//! Empirical moments of the observed sample
//!
//! Moments are computed once, from the observed (truncated or censored)
//! sample only, and seed both the starting parameters and the projection
//! bounds.

use crate::linalg::{column_means, spd_cholesky, symmetrize};
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};

/// Sample mean and unbiased sample covariance
#[derive(Debug, Clone, PartialEq)]
pub struct NormalMoments {
    loc: DVector<f64>,
    covariance: DMatrix<f64>,
    n_samples: usize,
}

impl NormalMoments {
    /// Moments of an `n x d` sample matrix
    ///
    /// Fails with `DegenerateMoments` for fewer than two samples or a
    /// singular covariance.
    pub fn from_samples(samples: &DMatrix<f64>) -> Result<Self> {
        let n = samples.nrows();
        if n < 2 {
            return Err(Error::DegenerateMoments(format!(
                "need at least 2 observed samples, got {n}"
            )));
        }
        if samples.ncols() == 0 {
            return Err(Error::DegenerateMoments("samples have zero dimensions".to_string()));
        }
        if samples.iter().any(|v| !v.is_finite()) {
            return Err(Error::non_finite("observed samples"));
        }

        let loc = column_means(samples);
        let mut centered = samples.clone();
        for j in 0..centered.ncols() {
            centered.column_mut(j).add_scalar_mut(-loc[j]);
        }
        let covariance = symmetrize(&(centered.transpose() * &centered / (n as f64 - 1.0)));

        if spd_cholesky(&covariance).is_none() {
            return Err(Error::DegenerateMoments(
                "empirical covariance is singular".to_string(),
            ));
        }

        Ok(Self {
            loc,
            covariance,
            n_samples: n,
        })
    }

    pub fn loc(&self) -> &DVector<f64> {
        &self.loc
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Non-central second moment `Σ + μ μᵀ`
    pub fn second_moment(&self) -> DMatrix<f64> {
        &self.covariance + &self.loc * self.loc.transpose()
    }

    pub fn dim(&self) -> usize {
        self.loc.len()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }
}

/// Ordinary least squares fit of the observed regression sample
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionMoments {
    weight: DVector<f64>,
    bias: Option<f64>,
    noise_variance: f64,
    n_samples: usize,
}

impl RegressionMoments {
    /// OLS on features `x` (`n x d`) and responses `y` (`n x 1`)
    ///
    /// The noise variance is the sample variance of the residuals, divided by
    /// `n − 1` rather than `n − p`.
    pub fn from_samples(x: &DMatrix<f64>, y: &DMatrix<f64>, fit_bias: bool) -> Result<Self> {
        if y.ncols() != 1 {
            return Err(Error::shape_mismatch(1, y.ncols()));
        }
        if x.nrows() != y.nrows() {
            return Err(Error::shape_mismatch(x.nrows(), y.nrows()));
        }
        let n = x.nrows();
        let d = x.ncols();
        let p = d + usize::from(fit_bias);
        if d == 0 {
            return Err(Error::DegenerateMoments("features have zero dimensions".to_string()));
        }
        if n <= p {
            return Err(Error::DegenerateMoments(format!(
                "need more than {p} observed samples, got {n}"
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(Error::non_finite("observed regression sample"));
        }

        let design = if fit_bias {
            x.clone().insert_column(d, 1.0)
        } else {
            x.clone()
        };
        let rank_deficient = || Error::DegenerateMoments("design matrix is rank deficient".to_string());
        let gram = design.transpose() * &design;
        let l = spd_cholesky(&gram).ok_or_else(rank_deficient)?;
        let rhs = design.transpose() * y.column(0);
        let coefficients = l
            .solve_lower_triangular(&rhs)
            .and_then(|half| l.transpose().solve_upper_triangular(&half))
            .ok_or_else(rank_deficient)?;

        let residuals = y.column(0) - &design * &coefficients;
        let residual_mean = residuals.mean();
        let noise_variance = residuals
            .iter()
            .map(|r| (r - residual_mean).powi(2))
            .sum::<f64>()
            / (n as f64 - 1.0);
        if !(noise_variance.is_finite() && noise_variance > 0.0) {
            return Err(Error::DegenerateMoments(
                "residual variance is zero".to_string(),
            ));
        }

        let weight = coefficients.rows(0, d).into_owned();
        let bias = fit_bias.then(|| coefficients[d]);
        Ok(Self {
            weight,
            bias,
            noise_variance,
            n_samples: n,
        })
    }

    pub fn weight(&self) -> &DVector<f64> {
        &self.weight
    }

    pub fn bias(&self) -> Option<f64> {
        self.bias
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    /// Inverse noise variance `λ = 1/σ²`
    pub fn lambda(&self) -> f64 {
        1.0 / self.noise_variance
    }

    /// Weight in inverse-variance units `v = w λ`
    pub fn v(&self) -> DVector<f64> {
        &self.weight * self.lambda()
    }

    /// Bias in inverse-variance units `v0 = w0 λ`
    pub fn v0(&self) -> Option<f64> {
        self.bias.map(|b| b * self.lambda())
    }

    pub fn dim(&self) -> usize {
        self.weight.len()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }
}
