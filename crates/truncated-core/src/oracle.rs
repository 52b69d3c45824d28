//! Membership oracles
//!
//! An oracle is the computable predicate that defines the truncation or
//! censoring region. Only samples it accepts are observed (truncation) or
//! recorded by value (censoring). Oracles are immutable once built and are
//! shared read-only between the estimator, its gradient estimator and the
//! rejection sampler.

use crate::{Error, Result};
use nalgebra::DMatrix;
use std::fmt;
use std::sync::Arc;

/// Boolean membership predicate over fixed-dimension samples
pub trait MembershipOracle: fmt::Debug + Send + Sync {
    /// Dimension of the samples this oracle is defined over
    fn dim(&self) -> usize;

    /// Membership test for one sample
    ///
    /// Callers guarantee `sample.len() == self.dim()`; use [`contains`](Self::contains)
    /// for a checked call.
    fn contains_row(&self, sample: &[f64]) -> bool;

    /// Checked membership test for one sample
    fn contains(&self, sample: &[f64]) -> Result<bool> {
        if sample.len() != self.dim() {
            return Err(Error::shape_mismatch(self.dim(), sample.len()));
        }
        Ok(self.contains_row(sample))
    }

    /// Membership test for every row of an `n x d` batch
    fn contains_batch(&self, batch: &DMatrix<f64>) -> Result<Vec<bool>> {
        if batch.ncols() != self.dim() {
            return Err(Error::shape_mismatch(self.dim(), batch.ncols()));
        }
        let mut row = vec![0.0; self.dim()];
        Ok(batch
            .row_iter()
            .map(|r| {
                for (dst, src) in row.iter_mut().zip(r.iter()) {
                    *dst = *src;
                }
                self.contains_row(&row)
            })
            .collect())
    }
}

/// Shared, read-only handle to an oracle
pub type SharedOracle = Arc<dyn MembershipOracle>;

/// Accepts every sample (no truncation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    dim: usize,
}

impl Identity {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl MembershipOracle for Identity {
    fn dim(&self) -> usize {
        self.dim
    }

    fn contains_row(&self, _sample: &[f64]) -> bool {
        true
    }
}

/// Left truncation: every coordinate strictly above its threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Left {
    lower: Vec<f64>,
}

impl Left {
    pub fn new(lower: Vec<f64>) -> Self {
        Self { lower }
    }

    /// Single-coordinate left truncation `x > threshold`
    pub fn scalar(threshold: f64) -> Self {
        Self::new(vec![threshold])
    }
}

impl MembershipOracle for Left {
    fn dim(&self) -> usize {
        self.lower.len()
    }

    fn contains_row(&self, sample: &[f64]) -> bool {
        sample.iter().zip(&self.lower).all(|(x, lo)| x > lo)
    }
}

/// Right truncation: every coordinate strictly below its threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Right {
    upper: Vec<f64>,
}

impl Right {
    pub fn new(upper: Vec<f64>) -> Self {
        Self { upper }
    }

    /// Single-coordinate right truncation `x < threshold`
    pub fn scalar(threshold: f64) -> Self {
        Self::new(vec![threshold])
    }
}

impl MembershipOracle for Right {
    fn dim(&self) -> usize {
        self.upper.len()
    }

    fn contains_row(&self, sample: &[f64]) -> bool {
        sample.iter().zip(&self.upper).all(|(x, hi)| x < hi)
    }
}

/// Open box: every coordinate strictly between its bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Interval {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::shape_mismatch(lower.len(), upper.len()));
        }
        if lower.iter().zip(&upper).any(|(lo, hi)| lo >= hi) {
            return Err(Error::invalid_hyperparameter(
                "interval",
                "every lower bound must be below its upper bound",
            ));
        }
        Ok(Self { lower, upper })
    }
}

impl MembershipOracle for Interval {
    fn dim(&self) -> usize {
        self.lower.len()
    }

    fn contains_row(&self, sample: &[f64]) -> bool {
        sample
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(x, (lo, hi))| x > lo && x < hi)
    }
}

/// Half-space `normal . x > offset`
#[derive(Debug, Clone, PartialEq)]
pub struct HalfSpace {
    normal: Vec<f64>,
    offset: f64,
}

impl HalfSpace {
    pub fn new(normal: Vec<f64>, offset: f64) -> Result<Self> {
        if normal.is_empty() || normal.iter().all(|w| *w == 0.0) {
            return Err(Error::invalid_hyperparameter(
                "half-space normal",
                "must have at least one non-zero component",
            ));
        }
        Ok(Self { normal, offset })
    }

    /// Axis-aligned half-space `x[axis] > threshold` in `dim` dimensions
    pub fn axis(dim: usize, axis: usize, threshold: f64) -> Result<Self> {
        if axis >= dim {
            return Err(Error::shape_mismatch(dim, axis + 1));
        }
        let mut normal = vec![0.0; dim];
        normal[axis] = 1.0;
        Self::new(normal, threshold)
    }
}

impl MembershipOracle for HalfSpace {
    fn dim(&self) -> usize {
        self.normal.len()
    }

    fn contains_row(&self, sample: &[f64]) -> bool {
        let projection: f64 = sample.iter().zip(&self.normal).map(|(x, w)| x * w).sum();
        projection > self.offset
    }
}

/// Closed Euclidean ball
#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    center: Vec<f64>,
    radius: f64,
}

impl Sphere {
    pub fn new(center: Vec<f64>, radius: f64) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::invalid_hyperparameter(
                "sphere radius",
                "must be positive and finite",
            ));
        }
        Ok(Self { center, radius })
    }
}

impl MembershipOracle for Sphere {
    fn dim(&self) -> usize {
        self.center.len()
    }

    fn contains_row(&self, sample: &[f64]) -> bool {
        let dist_sq: f64 = sample
            .iter()
            .zip(&self.center)
            .map(|(x, c)| (x - c) * (x - c))
            .sum();
        dist_sq <= self.radius * self.radius
    }
}

/// Oracle backed by an arbitrary predicate
pub struct FnOracle<F> {
    dim: usize,
    name: &'static str,
    predicate: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&[f64]) -> bool + Send + Sync,
{
    pub fn new(dim: usize, name: &'static str, predicate: F) -> Self {
        Self {
            dim,
            name,
            predicate,
        }
    }
}

impl<F> fmt::Debug for FnOracle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOracle")
            .field("dim", &self.dim)
            .field("name", &self.name)
            .finish()
    }
}

impl<F> MembershipOracle for FnOracle<F>
where
    F: Fn(&[f64]) -> bool + Send + Sync,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn contains_row(&self, sample: &[f64]) -> bool {
        (self.predicate)(sample)
    }
}
