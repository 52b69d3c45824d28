//! Bias-corrected likelihood gradients for truncated and censored data
//!
//! Each criterion implements [`truncated_core::Criterion`]: `evaluate`
//! reports a diagnostic loss (possibly a constant placeholder) and
//! `gradient` returns the descent direction the training loop steps along.
//! The corrections come from rejection sampling against the membership
//! oracle, through [`RejectionSampler`].
//!
//! | Criterion | Model | Loss value |
//! |---|---|---|
//! | [`CensoredNormalNll`] | `NormalModel` | always zero |
//! | [`TruncatedNormalNll`] | `NormalModel` | batch mean of [`ExpH`] |
//! | [`TruncatedMse`] | `LinearModel` | half mean squared error |
//! | [`TruncatedUnknownVarianceMse`] | `LinearUnknownVariance` | half mean squared error |

pub mod exp_h;
pub mod normal;
pub mod regression;
pub mod sampler;

pub use exp_h::ExpH;
pub use normal::{CensoredNormalNll, TruncatedNormalNll};
pub use regression::{TruncatedMse, TruncatedUnknownVarianceMse};
pub use sampler::{ConditionalMoments, RejectionSampler};
