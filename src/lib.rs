//! Estimation of truncated and censored distributions
//!
//! Samples are observed only inside the region accepted by a
//! [`MembershipOracle`]. The estimators here recover the parameters of the
//! underlying, untruncated distribution by projected gradient descent: the
//! gradient of the likelihood is corrected for the truncation by rejection
//! sampling against the oracle, and every step is projected back into a
//! confidence region around the empirical moments of the observed sample.
//!
//! | Estimator | Observed | Learned |
//! |---|---|---|
//! | [`TruncatedNormal`] | samples inside the region | mean and covariance |
//! | [`CensoredNormal`] | by-value records of a censored sample | mean and covariance |
//! | [`TruncatedRegression`] | `(x, y)` pairs with `y` inside the region | weights, bias, noise variance |
//!
//! The member crates are re-exported for lower-level use: oracles, config
//! and parameter sets in [`truncated_core`], criteria in
//! [`truncated_gradient`], projectors in [`truncated_projection`] and the
//! training loop in [`truncated_train`].
//!
//! # Example
//!
//! ```rust,no_run
//! use nalgebra::DMatrix;
//! use std::sync::Arc;
//! use truncated_stats::{EstimatorConfig, HalfSpace, TruncatedNormal};
//!
//! # fn main() -> truncated_stats::Result<()> {
//! let oracle = Arc::new(HalfSpace::axis(2, 0, 0.0)?);
//! let config = EstimatorConfig::builder()
//!     .alpha(0.5)
//!     .batch_size(1_000)
//!     .epochs(50)
//!     .seed(7)
//!     .build()?;
//!
//! let samples = DMatrix::from_row_slice(3, 2, &[0.5, 1.2, 1.7, 0.3, 0.9, 2.0]);
//! let fit = TruncatedNormal::new(oracle, config).fit(&samples)?;
//! println!("mean {} covariance {}", fit.loc, fit.covariance);
//! # Ok(())
//! # }
//! ```

pub mod censored;
pub mod experiment;
pub mod normal;
pub mod regression;

pub use truncated_core;
pub use truncated_gradient;
pub use truncated_projection;
pub use truncated_train;

pub use censored::CensoredNormal;
pub use experiment::{run_sweep, SweepRecord, SweepSettings};
pub use normal::{NormalFit, TruncatedNormal};
pub use regression::{NoiseVariance, RegressionFit, RegressionModel, TruncatedRegression};
pub use truncated_core::{
    EstimatorConfig, Error, FnOracle, HalfSpace, Identity, Interval, Left, LearningRateSchedule,
    MembershipOracle, Result, Right, SharedOracle, Sphere,
};
pub use truncated_train::TrainSummary;
