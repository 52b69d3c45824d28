//! Learnable parameter sets and their gradients
//!
//! Every model exposes its mutable state as named groups of `f64` slices so
//! the training loop can step any family uniformly, and the projectors can
//! rewrite it in place after each step.

use crate::linalg::{spd_inverse, symmetrize};
use crate::moments::{NormalMoments, RegressionMoments};
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::slice;

/// Parameter state addressable by group name
pub trait Learnable {
    /// Names of every group, in step order
    fn group_names(&self) -> Vec<&'static str>;

    /// Read access to one group
    fn group(&self, name: &str) -> Option<&[f64]>;

    /// Write access to one group
    fn group_mut(&mut self, name: &str) -> Option<&mut [f64]>;

    /// Total number of scalar parameters
    fn num_parameters(&self) -> usize {
        self.group_names()
            .iter()
            .filter_map(|name| self.group(name))
            .map(<[f64]>::len)
            .sum()
    }
}

/// Gradient of a criterion, one flattened vector per parameter group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gradient {
    groups: Vec<(&'static str, DVector<f64>)>,
}

impl Gradient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the gradient for `name`
    pub fn with(mut self, name: &'static str, values: DVector<f64>) -> Self {
        self.push(name, values);
        self
    }

    pub fn push(&mut self, name: &'static str, values: DVector<f64>) {
        self.groups.push((name, values));
    }

    pub fn get(&self, name: &str) -> Option<&DVector<f64>> {
        self.groups
            .iter()
            .find(|(group, _)| *group == name)
            .map(|(_, values)| values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &DVector<f64>)> {
        self.groups.iter().map(|(name, values)| (*name, values))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Euclidean norm over every group
    pub fn norm(&self) -> f64 {
        self.groups
            .iter()
            .map(|(_, values)| values.norm_squared())
            .sum::<f64>()
            .sqrt()
    }

    /// Fail with `Computation` if any entry is NaN or infinite
    pub fn check_finite(&self) -> Result<()> {
        match self
            .groups
            .iter()
            .find(|(_, values)| values.iter().any(|v| !v.is_finite()))
        {
            Some((name, _)) => Err(Error::non_finite(&format!("gradient of {name}"))),
            None => Ok(()),
        }
    }
}

/// Multivariate normal in natural parameters `T = Σ⁻¹`, `v = T μ`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalModel {
    precision: DMatrix<f64>,
    shift: DVector<f64>,
}

impl NormalModel {
    pub const PRECISION: &'static str = "precision";
    pub const SHIFT: &'static str = "shift";

    /// Natural parameters of `N(loc, covariance)`
    pub fn from_loc_covariance(loc: &DVector<f64>, covariance: &DMatrix<f64>) -> Result<Self> {
        if covariance.nrows() != loc.len() || covariance.ncols() != loc.len() {
            return Err(Error::shape_mismatch(loc.len(), covariance.nrows()));
        }
        let precision =
            spd_inverse(covariance).ok_or_else(|| Error::not_positive_definite("covariance"))?;
        let shift = &precision * loc;
        Ok(Self { precision, shift })
    }

    /// Starting point at the empirical moments
    pub fn from_moments(moments: &NormalMoments) -> Result<Self> {
        Self::from_loc_covariance(moments.loc(), moments.covariance())
    }

    pub fn dim(&self) -> usize {
        self.shift.len()
    }

    pub fn precision(&self) -> &DMatrix<f64> {
        &self.precision
    }

    pub fn shift(&self) -> &DVector<f64> {
        &self.shift
    }

    /// `Σ = T⁻¹`, failing if the precision lost positive definiteness
    pub fn covariance(&self) -> Result<DMatrix<f64>> {
        spd_inverse(&symmetrize(&self.precision))
            .ok_or_else(|| Error::not_positive_definite("precision"))
    }

    /// `μ = T⁻¹ v`
    pub fn loc(&self) -> Result<DVector<f64>> {
        Ok(self.covariance()? * &self.shift)
    }

    /// Overwrite the state with the natural parameters of `N(loc, covariance)`
    pub fn set_loc_covariance(
        &mut self,
        loc: &DVector<f64>,
        covariance: &DMatrix<f64>,
    ) -> Result<()> {
        *self = Self::from_loc_covariance(loc, covariance)?;
        Ok(())
    }
}

impl Learnable for NormalModel {
    fn group_names(&self) -> Vec<&'static str> {
        vec![Self::PRECISION, Self::SHIFT]
    }

    fn group(&self, name: &str) -> Option<&[f64]> {
        match name {
            Self::PRECISION => Some(self.precision.as_slice()),
            Self::SHIFT => Some(self.shift.as_slice()),
            _ => None,
        }
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        match name {
            Self::PRECISION => Some(self.precision.as_mut_slice()),
            Self::SHIFT => Some(self.shift.as_mut_slice()),
            _ => None,
        }
    }
}

/// Linear model `y = x·w + w0` with a fixed noise variance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    weight: DVector<f64>,
    bias: Option<f64>,
}

impl LinearModel {
    pub const WEIGHT: &'static str = "weight";
    pub const BIAS: &'static str = "bias";

    pub fn new(weight: DVector<f64>, bias: Option<f64>) -> Self {
        Self { weight, bias }
    }

    /// Starting point at the least-squares fit
    pub fn from_moments(moments: &RegressionMoments) -> Self {
        Self::new(moments.weight().clone(), moments.bias())
    }

    pub fn weight(&self) -> &DVector<f64> {
        &self.weight
    }

    pub fn bias(&self) -> Option<f64> {
        self.bias
    }

    pub fn dim(&self) -> usize {
        self.weight.len()
    }

    /// Predicted response for every row of `x`
    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        if x.ncols() != self.dim() {
            return Err(Error::shape_mismatch(self.dim(), x.ncols()));
        }
        let mut prediction = x * &self.weight;
        if let Some(bias) = self.bias {
            prediction.add_scalar_mut(bias);
        }
        Ok(prediction)
    }
}

impl Learnable for LinearModel {
    fn group_names(&self) -> Vec<&'static str> {
        let mut names = vec![Self::WEIGHT];
        if self.bias.is_some() {
            names.push(Self::BIAS);
        }
        names
    }

    fn group(&self, name: &str) -> Option<&[f64]> {
        match name {
            Self::WEIGHT => Some(self.weight.as_slice()),
            Self::BIAS => self.bias.as_ref().map(slice::from_ref),
            _ => None,
        }
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        match name {
            Self::WEIGHT => Some(self.weight.as_mut_slice()),
            Self::BIAS => self.bias.as_mut().map(slice::from_mut),
            _ => None,
        }
    }
}

/// Linear model with learnable noise variance, in inverse-variance units
///
/// The response is `N((x·v + v0) / λ, 1 / λ)`, so `w = v / λ`, `w0 = v0 / λ`
/// and `σ² = 1 / λ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearUnknownVariance {
    v: DVector<f64>,
    v0: Option<f64>,
    lambda: f64,
}

impl LinearUnknownVariance {
    pub const V: &'static str = "v";
    pub const V0: &'static str = "v0";
    pub const LAMBDA: &'static str = "lambda";

    pub fn new(v: DVector<f64>, v0: Option<f64>, lambda: f64) -> Self {
        Self { v, v0, lambda }
    }

    /// Starting point at the least-squares fit and its residual variance
    pub fn from_moments(moments: &RegressionMoments) -> Self {
        Self::new(moments.v(), moments.v0(), moments.lambda())
    }

    /// Rebuild from implied weight, bias and noise variance
    pub fn from_implied(weight: &DVector<f64>, bias: Option<f64>, variance: f64) -> Result<Self> {
        if !(variance.is_finite() && variance > 0.0) {
            return Err(Error::not_positive_definite("noise variance"));
        }
        let lambda = 1.0 / variance;
        Ok(Self::new(weight * lambda, bias.map(|b| b * lambda), lambda))
    }

    pub fn v(&self) -> &DVector<f64> {
        &self.v
    }

    pub fn v0(&self) -> Option<f64> {
        self.v0
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn dim(&self) -> usize {
        self.v.len()
    }

    /// `σ² = 1 / λ`, failing once λ has left the positive half-line
    pub fn variance(&self) -> Result<f64> {
        if self.lambda.is_finite() && self.lambda > 0.0 {
            Ok(1.0 / self.lambda)
        } else {
            Err(Error::not_positive_definite("inverse noise variance"))
        }
    }

    /// Implied weight `w = v σ²`
    pub fn weight(&self) -> Result<DVector<f64>> {
        Ok(&self.v * self.variance()?)
    }

    /// Implied bias `w0 = v0 σ²`
    pub fn bias(&self) -> Result<Option<f64>> {
        let variance = self.variance()?;
        Ok(self.v0.map(|v0| v0 * variance))
    }

    /// Mean response `(x·v + v0) / λ` for every row of `x`
    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        if x.ncols() != self.dim() {
            return Err(Error::shape_mismatch(self.dim(), x.ncols()));
        }
        let variance = self.variance()?;
        let mut prediction = x * &self.v;
        if let Some(v0) = self.v0 {
            prediction.add_scalar_mut(v0);
        }
        Ok(prediction * variance)
    }
}

impl Learnable for LinearUnknownVariance {
    fn group_names(&self) -> Vec<&'static str> {
        let mut names = vec![Self::V];
        if self.v0.is_some() {
            names.push(Self::V0);
        }
        names.push(Self::LAMBDA);
        names
    }

    fn group(&self, name: &str) -> Option<&[f64]> {
        match name {
            Self::V => Some(self.v.as_slice()),
            Self::V0 => self.v0.as_ref().map(slice::from_ref),
            Self::LAMBDA => Some(slice::from_ref(&self.lambda)),
            _ => None,
        }
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        match name {
            Self::V => Some(self.v.as_mut_slice()),
            Self::V0 => self.v0.as_mut().map(slice::from_mut),
            Self::LAMBDA => Some(slice::from_mut(&mut self.lambda)),
            _ => None,
        }
    }
}
