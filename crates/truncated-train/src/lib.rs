//! Training loop for truncated and censored estimation
//!
//! [`Trainer`] runs mini-batch projected gradient descent: the
//! [`Criterion`](truncated_core::Criterion) supplies the descent direction,
//! the [`IterationHook`](truncated_core::IterationHook) (normally a
//! projector) runs after every step, and [`Loaders`] feed shuffled
//! mini-batches with an optional validation split.

pub mod data;
pub mod trainer;

pub use data::{Batch, DataLoader, Loaders};
pub use trainer::{ParamGroup, TrainSummary, Trainer};
