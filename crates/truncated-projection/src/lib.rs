//! Confidence-region projectors
//!
//! After every optimizer step the training loop hands the model to an
//! [`IterationHook`](truncated_core::IterationHook); the projectors here clip
//! it back into bounds derived from the empirical moments of the observed
//! sample and a per-family confidence radius. One projector exists per
//! family, chosen when the estimator is built.
//!
//! With `clamp` disabled in the configuration the bounds are still computed
//! and exposed, but the hook leaves the model untouched.

pub mod normal;
pub mod radius;
pub mod regression;

pub use normal::NormalProjection;
pub use radius::{variance_floor, Family};
pub use regression::{KnownVarianceProjection, UnknownVarianceProjection};
