//! Core traits and types for truncated and censored estimation
//!
//! This crate holds everything the other truncated-stats crates share:
//!
//! - [`MembershipOracle`]: the predicate that defines the observed region
//! - [`EstimatorConfig`]: one immutable configuration per fit
//! - [`NormalMoments`] / [`RegressionMoments`]: empirical moments of the
//!   observed sample, used for initialization and for the projection bounds
//! - [`Learnable`] parameter sets and their [`Gradient`]s
//! - [`Criterion`] and [`IterationHook`]: the seams between gradient
//!   estimators, projectors and the training loop
//!
//! # Example
//!
//! ```rust
//! use nalgebra::DMatrix;
//! use truncated_core::{HalfSpace, MembershipOracle, NormalMoments};
//!
//! let oracle = HalfSpace::axis(2, 0, 0.0).unwrap();
//! let samples = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 2.0, 1.0, -1.0, 0.5, 0.5, 2.0]);
//! let accepted = oracle.contains_batch(&samples).unwrap();
//! assert_eq!(accepted, vec![true, true, false, true]);
//!
//! let moments = NormalMoments::from_samples(&samples).unwrap();
//! assert_eq!(moments.dim(), 2);
//! ```

pub mod bounds;
pub mod config;
pub mod error;
pub mod linalg;
pub mod moments;
pub mod oracle;
pub mod params;
pub mod traits;

pub use bounds::Bounds;
pub use config::{EstimatorConfig, EstimatorConfigBuilder, LearningRateSchedule};
pub use error::{Error, Result};
pub use moments::{NormalMoments, RegressionMoments};
pub use oracle::{
    FnOracle, HalfSpace, Identity, Interval, Left, MembershipOracle, Right, SharedOracle, Sphere,
};
pub use params::{Gradient, Learnable, LinearModel, LinearUnknownVariance, NormalModel};
pub use traits::{Criterion, IterationHook, Phase};
