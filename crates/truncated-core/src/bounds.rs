//! Per-entry parameter bounds used by the projectors

use crate::{Error, Result};
use nalgebra::DVector;

/// Closed interval `[lower[i], upper[i]]` for every entry of a flattened parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    /// Create bounds, rejecting empty or non-finite intervals
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::shape_mismatch(lower.len(), upper.len()));
        }
        if lower.iter().chain(upper.iter()).any(|v| !v.is_finite()) {
            return Err(Error::non_finite("parameter bounds"));
        }
        if let Some(i) = (0..lower.len()).find(|&i| lower[i] > upper[i]) {
            return Err(Error::InvalidHyperparameters(format!(
                "empty bound interval at entry {i}: [{}, {}]",
                lower[i], upper[i]
            )));
        }
        Ok(Self { lower, upper })
    }

    /// `center ± radius`, optionally floored entry-wise
    ///
    /// Entries with a floor get `lower = max(floor, center - radius)`; their
    /// upper end is raised to the lower end if the floor overshoots it, so
    /// the interval is never empty.
    pub fn around(
        center: &DVector<f64>,
        radius: f64,
        floor: impl Fn(usize) -> Option<f64>,
    ) -> Result<Self> {
        let mut lower = center.add_scalar(-radius);
        let mut upper = center.add_scalar(radius);
        for i in 0..center.len() {
            if let Some(floor) = floor(i) {
                lower[i] = lower[i].max(floor);
                upper[i] = upper[i].max(lower[i]);
            }
        }
        Self::new(lower, upper)
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Width of each interval
    pub fn width(&self) -> DVector<f64> {
        &self.upper - &self.lower
    }

    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(v, (lo, hi))| v >= lo && v <= hi)
    }

    /// Clamp every entry into its interval, returning how many entries moved
    pub fn clamp(&self, values: &mut [f64]) -> Result<usize> {
        if values.len() != self.len() {
            return Err(Error::shape_mismatch(self.len(), values.len()));
        }
        let mut moved = 0;
        for (v, (lo, hi)) in values
            .iter_mut()
            .zip(self.lower.iter().zip(self.upper.iter()))
        {
            let clamped = v.clamp(*lo, *hi);
            if clamped != *v {
                moved += 1;
                *v = clamped;
            }
        }
        Ok(moved)
    }
}
