//! Shared generators for the end-to-end tests

#![allow(dead_code)]

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use truncated_stats::MembershipOracle;

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `n` draws from `N(loc, L Lᵀ)` that the oracle accepts, one per row
pub fn truncated_normal<R: Rng>(
    loc: &DVector<f64>,
    chol_lower: &DMatrix<f64>,
    oracle: &dyn MembershipOracle,
    n: usize,
    rng: &mut R,
) -> DMatrix<f64> {
    let d = loc.len();
    let mut rows = Vec::with_capacity(n * d);
    let mut accepted = 0;
    while accepted < n {
        let eps = DVector::from_fn(d, |_, _| rng.sample::<f64, _>(StandardNormal));
        let draw = loc + chol_lower * eps;
        if oracle.contains_row(draw.as_slice()) {
            rows.extend_from_slice(draw.as_slice());
            accepted += 1;
        }
    }
    DMatrix::from_row_slice(n, d, &rows)
}

/// Draw `n` pairs `y = x·w + b + σ ε` with `x ~ N(0, I)` and keep those whose
/// response the oracle accepts
pub fn truncated_regression<R: Rng>(
    weight: &DVector<f64>,
    bias: f64,
    noise_variance: f64,
    oracle: &dyn MembershipOracle,
    n: usize,
    rng: &mut R,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let d = weight.len();
    let sd = noise_variance.sqrt();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for _ in 0..n {
        let x = DVector::from_fn(d, |_, _| rng.sample::<f64, _>(StandardNormal));
        let y = x.dot(weight) + bias + sd * rng.sample::<f64, _>(StandardNormal);
        if oracle.contains_row(&[y]) {
            xs.extend_from_slice(x.as_slice());
            ys.push(y);
        }
    }
    let kept = ys.len();
    (
        DMatrix::from_row_slice(kept, d, &xs),
        DMatrix::from_column_slice(kept, 1, &ys),
    )
}
