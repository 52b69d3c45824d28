//! Seams between the estimators, the gradient estimators, the projectors and
//! the training loop

use crate::params::Gradient;
use crate::Result;
use nalgebra::DMatrix;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Which pass of the training loop triggered a hook call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Train,
    Validation,
}

/// Loss with an explicitly supplied gradient
///
/// The training loop never differentiates `evaluate`; it steps along
/// `gradient` directly. `evaluate` may therefore be a diagnostic value or a
/// constant placeholder when the true loss has no closed form.
pub trait Criterion<M>: Send + Sync {
    /// Scalar loss of `model` on one batch
    fn evaluate(&self, model: &M, input: &DMatrix<f64>, target: Option<&DMatrix<f64>>)
        -> Result<f64>;

    /// Gradient of the loss with respect to every learnable group of `model`
    fn gradient(
        &self,
        model: &M,
        input: &DMatrix<f64>,
        target: Option<&DMatrix<f64>>,
        rng: &mut dyn RngCore,
    ) -> Result<Gradient>;
}

/// Callback run after every optimizer step and on every validation batch
pub trait IterationHook<M>: Send + Sync {
    fn on_iteration(
        &self,
        model: &mut M,
        iteration: usize,
        phase: Phase,
        input: &DMatrix<f64>,
        target: Option<&DMatrix<f64>>,
    ) -> Result<()>;
}

/// No-op hook: plain (unprojected) gradient descent
impl<M> IterationHook<M> for () {
    fn on_iteration(
        &self,
        _model: &mut M,
        _iteration: usize,
        _phase: Phase,
        _input: &DMatrix<f64>,
        _target: Option<&DMatrix<f64>>,
    ) -> Result<()> {
        Ok(())
    }
}
