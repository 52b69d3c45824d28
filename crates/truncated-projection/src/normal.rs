//! Projection for the truncated and censored normal families
//!
//! Bounds live in moment space: the location is kept within `radius` of the
//! empirical mean and every covariance entry within `radius` of the
//! empirical covariance, with the diagonal floored at `alpha² / 12`. The
//! model is stored in natural parameters, so projecting converts to
//! `(μ, Σ)`, clamps, and converts back.
//!
//! Entrywise clamping only floors the diagonal, so a correlated covariance
//! can leave it indefinite. The clamped covariance then has its eigenvalues
//! lifted to the floor. A precision that a gradient step pushed out of the
//! positive definite cone is lifted the same way before it is inverted, with
//! its eigenvalues floored at the reciprocal of the largest admissible
//! variance.

use crate::radius::{variance_floor, Family};
use nalgebra::{DMatrix, DVector};
use tracing::trace;
use truncated_core::linalg::{spd_cholesky, spd_inverse, spd_repair, symmetrize};
use truncated_core::{
    Bounds, Error, EstimatorConfig, IterationHook, NormalModel, NormalMoments, Phase, Result,
};

/// Post-step hook clipping a [`NormalModel`] into its confidence region
#[derive(Debug, Clone, PartialEq)]
pub struct NormalProjection {
    family: Family,
    radius: f64,
    loc_bounds: Bounds,
    covariance_bounds: Bounds,
    variance_floor: f64,
    precision_floor: f64,
    clamp: bool,
}

impl NormalProjection {
    pub fn new(family: Family, moments: &NormalMoments, config: &EstimatorConfig) -> Result<Self> {
        if !family.is_normal() {
            return Err(Error::invalid_hyperparameter(
                "projection family",
                &format!("{family:?} is not a normal family"),
            ));
        }
        let alpha = config.alpha();
        let radius = family.radius(alpha, config.radius());
        let d = moments.dim();
        let floor = variance_floor(alpha, 1.0);

        let loc_bounds = Bounds::around(moments.loc(), radius, |_| None)?;
        // column-major flattening: entry i sits on the diagonal iff i % (d + 1) == 0
        let flat_covariance = DVector::from_column_slice(moments.covariance().as_slice());
        let covariance_bounds =
            Bounds::around(&flat_covariance, radius, |i| (i % (d + 1) == 0).then_some(floor))?;
        let max_variance = (0..d)
            .map(|i| covariance_bounds.upper()[i * (d + 1)])
            .fold(floor, f64::max);

        Ok(Self {
            family,
            radius,
            loc_bounds,
            covariance_bounds,
            variance_floor: floor,
            precision_floor: 1.0 / max_variance,
            clamp: config.clamp(),
        })
    }

    /// Projector with the truncated-normal radius `r · sqrt(ln(1/alpha))`
    pub fn truncated(moments: &NormalMoments, config: &EstimatorConfig) -> Result<Self> {
        Self::new(Family::TruncatedNormal, moments, config)
    }

    /// Projector with the censored-normal radius `r · ln(1/alpha) / alpha²`
    pub fn censored(moments: &NormalMoments, config: &EstimatorConfig) -> Result<Self> {
        Self::new(Family::CensoredNormal, moments, config)
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn loc_bounds(&self) -> &Bounds {
        &self.loc_bounds
    }

    /// Bounds on the covariance entries, flattened column-major
    pub fn covariance_bounds(&self) -> &Bounds {
        &self.covariance_bounds
    }

    /// Whether the hook actually modifies the model
    pub fn is_active(&self) -> bool {
        self.clamp
    }

    /// Clip `model` into the bounds, returning how many entries moved
    ///
    /// The model is rewritten only when something moved or had to be
    /// repaired to positive definiteness. Fails with
    /// `NonPositiveDefiniteProjection` only if a matrix is not finite.
    pub fn project(&self, model: &mut NormalModel) -> Result<usize> {
        let d = self.loc_bounds.len();
        if model.dim() != d {
            return Err(Error::shape_mismatch(d, model.dim()));
        }

        let mut precision = symmetrize(model.precision());
        let mut repaired = false;
        if spd_cholesky(&precision).is_none() {
            precision = spd_repair(&precision, self.precision_floor)
                .ok_or_else(|| Error::not_positive_definite("precision"))?;
            repaired = true;
        }
        let covariance =
            spd_inverse(&precision).ok_or_else(|| Error::not_positive_definite("precision"))?;
        let mut loc = &covariance * model.shift();
        let mut flat_covariance = covariance.as_slice().to_vec();

        let moved = self.loc_bounds.clamp(loc.as_mut_slice())?
            + self.covariance_bounds.clamp(&mut flat_covariance)?;
        if moved == 0 && !repaired {
            return Ok(0);
        }

        let mut clamped = symmetrize(&DMatrix::from_column_slice(d, d, &flat_covariance));
        if spd_cholesky(&clamped).is_none() {
            clamped = spd_repair(&clamped, self.variance_floor)
                .ok_or_else(|| Error::not_positive_definite("projected covariance"))?;
            repaired = true;
        }
        model.set_loc_covariance(&loc, &clamped)?;
        trace!(moved, repaired, family = ?self.family, "projected normal parameters");
        Ok(moved)
    }
}

impl IterationHook<NormalModel> for NormalProjection {
    fn on_iteration(
        &self,
        model: &mut NormalModel,
        _iteration: usize,
        _phase: Phase,
        _input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
    ) -> Result<()> {
        if self.clamp {
            self.project(model)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use truncated_core::Learnable;

    fn moments() -> NormalMoments {
        let samples = DMatrix::from_row_slice(
            4,
            2,
            &[0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 2.0, 3.0],
        );
        NormalMoments::from_samples(&samples).unwrap()
    }

    fn config(alpha: f64, clamp: bool) -> EstimatorConfig {
        EstimatorConfig::builder()
            .alpha(alpha)
            .radius(1.0)
            .clamp(clamp)
            .build()
            .unwrap()
    }

    #[test]
    fn test_bounds_layout() {
        let projection = NormalProjection::truncated(&moments(), &config(0.5, true)).unwrap();
        let radius = (2.0_f64).ln().sqrt();
        assert_relative_eq!(projection.radius(), radius);
        assert_relative_eq!(projection.loc_bounds().lower()[0], 1.0 - radius);
        assert_relative_eq!(projection.loc_bounds().upper()[1], 2.0 + radius);

        // off-diagonal entries are unfloored, diagonal entries are floored
        let cov_bounds = projection.covariance_bounds();
        assert_relative_eq!(cov_bounds.lower()[1], -radius);
        assert!(cov_bounds.lower()[0] >= 0.25 / 12.0);
        assert!(cov_bounds.lower()[3] >= 0.25 / 12.0);
    }

    #[test]
    fn test_project_clamps_location_and_variance() {
        let projection = NormalProjection::truncated(&moments(), &config(0.5, true)).unwrap();
        let mut model = NormalModel::from_loc_covariance(
            &DVector::from_vec(vec![10.0, 2.0]),
            &DMatrix::from_row_slice(2, 2, &[4.0 / 3.0, 0.0, 0.0, 100.0]),
        )
        .unwrap();
        let moved = projection.project(&mut model).unwrap();
        assert_eq!(moved, 2);

        let loc = model.loc().unwrap();
        let cov = model.covariance().unwrap();
        assert_relative_eq!(loc[0], projection.loc_bounds().upper()[0], epsilon = 1e-9);
        assert_relative_eq!(loc[1], 2.0, epsilon = 1e-9);
        assert_relative_eq!(cov[(1, 1)], projection.covariance_bounds().upper()[3], epsilon = 1e-9);
    }

    #[test]
    fn test_inside_point_is_untouched() {
        let moments = moments();
        let projection = NormalProjection::censored(&moments, &config(0.5, true)).unwrap();
        let mut model = NormalModel::from_moments(&moments).unwrap();
        let before = model.clone();
        assert_eq!(projection.project(&mut model).unwrap(), 0);
        assert_eq!(model, before);
    }

    #[test]
    fn test_disabled_clamp_is_noop_hook() {
        let projection = NormalProjection::truncated(&moments(), &config(0.5, false)).unwrap();
        assert!(!projection.is_active());
        let mut model = NormalModel::from_loc_covariance(
            &DVector::from_vec(vec![10.0, 10.0]),
            &DMatrix::identity(2, 2),
        )
        .unwrap();
        let before = model.clone();
        projection
            .on_iteration(&mut model, 0, Phase::Train, &DMatrix::zeros(1, 2), None)
            .unwrap();
        assert_eq!(model, before);
    }

    fn min_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
        matrix.clone().symmetric_eigen().eigenvalues.min()
    }

    #[test]
    fn test_correlated_clamp_stays_positive_definite() {
        let samples = DMatrix::from_row_slice(4, 2, &[0.0, 0.1, 1.0, 0.9, 2.0, 2.1, 3.0, 2.95]);
        let moments = NormalMoments::from_samples(&samples).unwrap();
        let projection = NormalProjection::truncated(&moments, &config(0.99, true)).unwrap();

        // positive definite, but clamping entry by entry alone lands on an
        // indefinite matrix since the off-diagonal stays near its bound
        let empirical = moments.covariance();
        let candidate = DMatrix::from_row_slice(
            2,
            2,
            &[
                empirical[(0, 0)] + 1.0,
                empirical[(0, 1)] + 0.1,
                empirical[(1, 0)] + 0.1,
                empirical[(1, 1)] - 0.3,
            ],
        );
        assert!(min_eigenvalue(&candidate) > 0.1);
        let mut model = NormalModel::from_loc_covariance(moments.loc(), &candidate).unwrap();

        let moved = projection.project(&mut model).unwrap();
        assert_eq!(moved, 2);
        let cov = model.covariance().unwrap();
        assert!(min_eigenvalue(&cov) >= 0.99 * 0.99 / 12.0 - 1e-9);
        assert_relative_eq!(model.loc().unwrap(), moments.loc().clone(), epsilon = 1e-9);
    }

    #[test]
    fn test_indefinite_precision_is_repaired() {
        let moments = moments();
        let projection = NormalProjection::truncated(&moments, &config(0.5, true)).unwrap();
        let mut model = NormalModel::from_moments(&moments).unwrap();
        for v in model.group_mut(NormalModel::PRECISION).unwrap() {
            *v = -*v;
        }
        assert!(model.covariance().is_err());

        projection.project(&mut model).unwrap();
        let cov = model.covariance().unwrap();
        assert!(min_eigenvalue(&cov) > 0.0);
        let upper = projection.covariance_bounds().upper();
        assert!(cov[(0, 0)] <= upper[0] + 1e-9);
        assert!(cov[(1, 1)] <= upper[3] + 1e-9);
    }

    #[test]
    fn test_non_finite_precision_is_reported() {
        let projection = NormalProjection::truncated(&moments(), &config(0.5, true)).unwrap();
        let mut model = NormalModel::from_moments(&moments()).unwrap();
        model.group_mut(NormalModel::PRECISION).unwrap()[0] = f64::NAN;
        assert!(matches!(
            projection.project(&mut model),
            Err(Error::NonPositiveDefiniteProjection(_))
        ));
    }

    #[test]
    fn test_rejects_regression_family() {
        assert!(
            NormalProjection::new(Family::RegressionKnownVariance, &moments(), &config(0.5, true))
                .is_err()
        );
    }
}
