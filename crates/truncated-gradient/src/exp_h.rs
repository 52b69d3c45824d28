//! Closed-form exponential-family correction term
//!
//! For a candidate shift `u` and precision-like matrix `B`, and the empirical
//! location `μ` and second moment `M = Σ + μ μᵀ` of the observed sample:
//!
//! ```text
//! Exp_h(u, B, x) = exp( xᵀ B x / 2 − tr((B − I) M) − (x − μ)ᵀ u + d/2 · ln 2π )
//! ```
//!
//! The term is deterministic given the parameters; nothing here samples.

use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;
use truncated_core::{Error, NormalMoments, Result};

/// `Exp_h` bound to the empirical moments of one observed sample
#[derive(Debug, Clone, PartialEq)]
pub struct ExpH {
    emp_loc: DVector<f64>,
    emp_second_moment: DMatrix<f64>,
}

impl ExpH {
    pub fn new(moments: &NormalMoments) -> Self {
        Self {
            emp_loc: moments.loc().clone(),
            emp_second_moment: moments.second_moment(),
        }
    }

    /// Build from an explicit empirical location and covariance
    pub fn from_loc_covariance(loc: DVector<f64>, covariance: &DMatrix<f64>) -> Result<Self> {
        let d = loc.len();
        if covariance.nrows() != d || covariance.ncols() != d {
            return Err(Error::shape_mismatch(d, covariance.nrows()));
        }
        let emp_second_moment = covariance + &loc * loc.transpose();
        Ok(Self {
            emp_loc: loc,
            emp_second_moment,
        })
    }

    pub fn dim(&self) -> usize {
        self.emp_loc.len()
    }

    /// `ln Exp_h(u, B, x)` for every row of `x`
    pub fn log_evaluate(
        &self,
        u: &DVector<f64>,
        b: &DMatrix<f64>,
        x: &DMatrix<f64>,
    ) -> Result<DVector<f64>> {
        let d = self.dim();
        if u.len() != d {
            return Err(Error::shape_mismatch(d, u.len()));
        }
        if b.nrows() != d || b.ncols() != d {
            return Err(Error::shape_mismatch(d, b.nrows()));
        }
        if x.ncols() != d {
            return Err(Error::shape_mismatch(d, x.ncols()));
        }

        let shifted = b - DMatrix::<f64>::identity(d, d);
        let trace = (shifted * &self.emp_second_moment).trace();
        let log_normalizer = 0.5 * d as f64 * (2.0 * PI).ln();

        Ok(DVector::from_iterator(
            x.nrows(),
            x.row_iter().map(|row| {
                let xt = row.transpose();
                let quadratic = 0.5 * (row * b * &xt)[(0, 0)];
                let centered = xt - &self.emp_loc;
                quadratic - trace - centered.dot(u) + log_normalizer
            }),
        ))
    }

    /// `Exp_h(u, B, x)` for every row of `x`
    pub fn evaluate(
        &self,
        u: &DVector<f64>,
        b: &DMatrix<f64>,
        x: &DMatrix<f64>,
    ) -> Result<DVector<f64>> {
        Ok(self.log_evaluate(u, b, x)?.map(f64::exp))
    }
}
