//! Property-based tests for the confidence-region projectors
//!
//! Bounds must be non-empty and respect the variance floor for every valid
//! `alpha` and radius, widen monotonically with the radius, and projecting
//! twice must give the same parameters as projecting once. Projecting any
//! positive definite candidate must succeed.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use truncated_core::{
    Bounds, EstimatorConfig, LinearModel, LinearUnknownVariance, NormalModel, NormalMoments,
    RegressionMoments,
};
use truncated_projection::{
    variance_floor, Family, KnownVarianceProjection, NormalProjection, UnknownVarianceProjection,
};

fn normal_moments() -> NormalMoments {
    let samples = DMatrix::from_row_slice(
        6,
        2,
        &[0.1, 1.0, 0.9, 1.4, 1.7, 0.6, 0.4, 2.2, 1.2, 1.1, 2.0, 1.9],
    );
    NormalMoments::from_samples(&samples).unwrap()
}

/// Whether the model sits inside every bound, up to `tol`
fn inside(projection: &NormalProjection, model: &NormalModel, tol: f64) -> bool {
    let within = |bounds: &Bounds, values: &[f64]| {
        values
            .iter()
            .enumerate()
            .all(|(i, v)| *v >= bounds.lower()[i] - tol && *v <= bounds.upper()[i] + tol)
    };
    within(projection.loc_bounds(), model.loc().unwrap().as_slice())
        && within(projection.covariance_bounds(), model.covariance().unwrap().as_slice())
}

fn regression_moments() -> RegressionMoments {
    let x = DMatrix::from_column_slice(6, 1, &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    let y = DMatrix::from_column_slice(6, 1, &[0.7, 1.2, 2.8, 3.1, 4.6, 5.3]);
    RegressionMoments::from_samples(&x, &y, true).unwrap()
}

fn config(alpha: f64, radius: f64) -> EstimatorConfig {
    EstimatorConfig::builder()
        .alpha(alpha)
        .radius(radius)
        .build()
        .unwrap()
}

proptest! {
    // Property: every bound interval is non-empty and variance bounds stay above the floor
    #[test]
    fn prop_bounds_non_empty_and_floored(alpha in 0.01f64..0.99, r in 0.1f64..10.0) {
        let config = config(alpha, r);
        let floor = variance_floor(alpha, 1.0);

        for family in [Family::TruncatedNormal, Family::CensoredNormal] {
            let projection = NormalProjection::new(family, &normal_moments(), &config).unwrap();
            let cov = projection.covariance_bounds();
            let width = cov.width();
            prop_assert!(width.iter().all(|w| *w >= 0.0));
            prop_assert!(projection.loc_bounds().width().iter().all(|w| *w >= 0.0));
            for i in [0, 3] {
                prop_assert!(cov.lower()[i] >= floor);
            }
        }

        let moments = regression_moments();
        let unknown = UnknownVarianceProjection::new(&moments, &config).unwrap();
        let variance = unknown.variance_bounds();
        prop_assert!(variance.lower()[0] > 0.0);
        prop_assert!(variance.lower()[0] >= variance_floor(alpha, moments.noise_variance()));
        prop_assert!(variance.lower()[0] <= variance.upper()[0]);

        let known = KnownVarianceProjection::new(&moments, &config).unwrap();
        prop_assert!(known.weight_bounds().width()[0] > 0.0);
    }

    // Property: a larger radius multiplier never narrows any interval
    #[test]
    fn prop_bounds_widen_with_radius(
        alpha in 0.01f64..0.99,
        r in 0.1f64..5.0,
        extra in 0.0f64..5.0,
    ) {
        let narrow = config(alpha, r);
        let wide = config(alpha, r + extra);

        for family in [Family::TruncatedNormal, Family::CensoredNormal] {
            let a = NormalProjection::new(family, &normal_moments(), &narrow).unwrap();
            let b = NormalProjection::new(family, &normal_moments(), &wide).unwrap();
            for (x, y) in a.covariance_bounds().width().iter().zip(b.covariance_bounds().width().iter()) {
                prop_assert!(y >= x);
            }
            for (x, y) in a.loc_bounds().width().iter().zip(b.loc_bounds().width().iter()) {
                prop_assert!(y >= x);
            }
        }

        let moments = regression_moments();
        let a = UnknownVarianceProjection::new(&moments, &narrow).unwrap();
        let b = UnknownVarianceProjection::new(&moments, &wide).unwrap();
        prop_assert!(b.variance_bounds().width()[0] >= a.variance_bounds().width()[0]);
        prop_assert!(b.weight_bounds().width()[0] >= a.weight_bounds().width()[0]);

        let a = KnownVarianceProjection::new(&moments, &narrow).unwrap();
        let b = KnownVarianceProjection::new(&moments, &wide).unwrap();
        prop_assert!(b.weight_bounds().width()[0] >= a.weight_bounds().width()[0]);
    }

    // Property: rarer observation (smaller alpha) never shrinks the radius
    #[test]
    fn prop_radius_grows_as_alpha_shrinks(
        alpha in 0.01f64..0.99,
        shrink in 0.0f64..1.0,
        r in 0.1f64..10.0,
    ) {
        let smaller = alpha * shrink.max(0.01);
        for family in Family::ALL {
            prop_assert!(family.radius(smaller, r) >= family.radius(alpha, r));
        }
    }

    // Property: projecting twice equals projecting once (normal family)
    #[test]
    fn prop_normal_projection_idempotent(
        alpha in 0.05f64..0.95,
        r in 0.1f64..3.0,
        loc in prop::collection::vec(-10.0f64..10.0, 2),
        diag in prop::collection::vec(0.01f64..20.0, 2),
    ) {
        let projection =
            NormalProjection::truncated(&normal_moments(), &config(alpha, r)).unwrap();
        let mut model = NormalModel::from_loc_covariance(
            &DVector::from_vec(loc),
            &DMatrix::from_diagonal(&DVector::from_vec(diag)),
        )
        .unwrap();

        projection.project(&mut model).unwrap();
        // a positive definite repair may leave entries outside their bounds
        prop_assume!(inside(&projection, &model, 1e-9));
        let once = model.clone();
        projection.project(&mut model).unwrap();

        assert_relative_eq!(model.loc().unwrap(), once.loc().unwrap(), epsilon = 1e-8);
        assert_relative_eq!(
            model.covariance().unwrap(),
            once.covariance().unwrap(),
            epsilon = 1e-8
        );
    }

    // Property: a positive definite candidate always projects to a positive definite model
    #[test]
    fn prop_normal_projection_keeps_positive_definite(
        alpha in 0.05f64..0.99,
        r in 0.1f64..3.0,
        loc in prop::collection::vec(-10.0f64..10.0, 2),
        factor in prop::collection::vec(-3.0f64..3.0, 4),
    ) {
        let projection =
            NormalProjection::truncated(&normal_moments(), &config(alpha, r)).unwrap();
        let l = DMatrix::from_row_slice(2, 2, &factor);
        let candidate = &l * l.transpose() + DMatrix::identity(2, 2) * 0.05;
        let mut model =
            NormalModel::from_loc_covariance(&DVector::from_vec(loc), &candidate).unwrap();

        projection.project(&mut model).unwrap();
        let cov = model.covariance().unwrap();
        prop_assert!(cov.clone().symmetric_eigen().eigenvalues.min() > 0.0);
    }

    // Property: projecting twice equals projecting once (regression)
    #[test]
    fn prop_regression_projection_idempotent(
        alpha in 0.05f64..0.95,
        r in 0.1f64..3.0,
        weight in -50.0f64..50.0,
        bias in -50.0f64..50.0,
        variance in 1e-4f64..100.0,
    ) {
        let moments = regression_moments();
        let config = config(alpha, r);

        let known = KnownVarianceProjection::new(&moments, &config).unwrap();
        let mut model = LinearModel::new(DVector::from_element(1, weight), Some(bias));
        known.project(&mut model).unwrap();
        let once = model.clone();
        prop_assert_eq!(known.project(&mut model).unwrap(), 0);
        prop_assert_eq!(&model, &once);

        let unknown = UnknownVarianceProjection::new(&moments, &config).unwrap();
        let mut model = LinearUnknownVariance::from_implied(
            &DVector::from_element(1, weight),
            Some(bias),
            variance,
        )
        .unwrap();
        unknown.project(&mut model).unwrap();
        let once = model.clone();
        unknown.project(&mut model).unwrap();
        assert_relative_eq!(model.lambda(), once.lambda(), max_relative = 1e-10);
        assert_relative_eq!(model.v()[0], once.v()[0], max_relative = 1e-10, epsilon = 1e-12);
        assert_relative_eq!(
            model.v0().unwrap(),
            once.v0().unwrap(),
            max_relative = 1e-10,
            epsilon = 1e-12
        );
    }
}
