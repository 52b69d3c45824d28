//! Projected gradient descent training loop
//!
//! Each step evaluates the criterion on a mini-batch, asks it for the
//! gradient, moves every selected parameter group against it, and then hands
//! the model to the iteration hook. Steps are strictly sequential: the hook
//! always runs after a step and before the next gradient evaluation.

use crate::data::{DataLoader, Loaders};
use nalgebra::DMatrix;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace};
use truncated_core::{
    Criterion, Error, EstimatorConfig, Gradient, IterationHook, Learnable, Phase, Result,
};

/// A named parameter group with an optional learning-rate override
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamGroup {
    pub name: &'static str,
    pub learning_rate: Option<f64>,
}

impl ParamGroup {
    /// Group stepped at the base learning rate
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            learning_rate: None,
        }
    }

    pub fn with_learning_rate(name: &'static str, learning_rate: f64) -> Self {
        Self {
            name,
            learning_rate: Some(learning_rate),
        }
    }
}

/// Outcome of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    /// Optimizer steps taken
    pub iterations: usize,
    /// Epochs started
    pub epochs: usize,
    /// Mean training loss over the last epoch
    pub final_loss: f64,
    /// Mean validation loss after the last epoch, if a validation loader exists
    pub validation_loss: Option<f64>,
    /// Whether the stop flag ended the run early
    pub cancelled: bool,
}

/// Mini-batch projected gradient descent driven by an [`EstimatorConfig`]
#[derive(Debug, Clone)]
pub struct Trainer<'a> {
    config: &'a EstimatorConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a EstimatorConfig) -> Self {
        Self { config, stop: None }
    }

    /// Stop between iterations once `flag` is set
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    fn stopped(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run the loop, mutating `model` in place
    ///
    /// `update_params = None` steps every group of the model at the base
    /// learning rate. Criterion, hook and shape errors abort the run and are
    /// returned unchanged.
    #[instrument(
        skip_all,
        fields(n = loaders.train.len(), epochs = self.config.epochs(), batch_size = self.config.batch_size())
    )]
    pub fn train<M, C, H>(
        &self,
        model: &mut M,
        loaders: &Loaders,
        criterion: &C,
        hook: &H,
        update_params: Option<&[ParamGroup]>,
        rng: &mut dyn RngCore,
    ) -> Result<TrainSummary>
    where
        M: Learnable,
        C: Criterion<M> + ?Sized,
        H: IterationHook<M> + ?Sized,
    {
        let groups = self.resolve_groups(model, update_params)?;
        let batches_per_epoch = loaders.train.num_batches();
        let planned = batches_per_epoch * self.config.epochs();
        let total = self
            .config
            .max_iterations()
            .map_or(planned, |cap| cap.min(planned));

        let mut summary = TrainSummary {
            iterations: 0,
            epochs: 0,
            final_loss: f64::NAN,
            validation_loss: None,
            cancelled: false,
        };
        if total == 0 {
            return Ok(summary);
        }

        'epochs: for epoch in 0..self.config.epochs() {
            summary.epochs = epoch + 1;
            let mut loss_sum = 0.0;
            let mut loss_count = 0usize;

            for batch in loaders.train.batches(rng) {
                if summary.iterations >= total {
                    break 'epochs;
                }
                if self.stopped() {
                    summary.cancelled = true;
                    debug!(iteration = summary.iterations, "training cancelled");
                    break 'epochs;
                }

                let target = batch.target.as_ref();
                let loss = criterion.evaluate(model, &batch.input, target)?;
                let gradient = criterion.gradient(model, &batch.input, target, rng)?;
                gradient.check_finite()?;

                let factor = self.config.schedule().factor(summary.iterations, total);
                self.step(model, &groups, &gradient, factor)?;
                summary.iterations += 1;
                hook.on_iteration(model, summary.iterations, Phase::Train, &batch.input, target)?;

                trace!(
                    epoch,
                    iteration = summary.iterations,
                    loss,
                    grad_norm = gradient.norm(),
                    "training step"
                );
                loss_sum += loss;
                loss_count += 1;
                summary.final_loss = loss_sum / loss_count as f64;
            }

            if let Some(validation) = &loaders.validation {
                let loss =
                    self.validate(model, validation, criterion, hook, summary.iterations, rng)?;
                summary.validation_loss = Some(loss);
            }
            debug!(
                epoch,
                iteration = summary.iterations,
                loss = summary.final_loss,
                validation_loss = ?summary.validation_loss,
                "epoch finished"
            );
        }

        Ok(summary)
    }

    fn resolve_groups<M: Learnable>(
        &self,
        model: &M,
        update_params: Option<&[ParamGroup]>,
    ) -> Result<Vec<(&'static str, f64)>> {
        let base = self.config.learning_rate();
        match update_params {
            None => Ok(model
                .group_names()
                .into_iter()
                .map(|name| (name, base))
                .collect()),
            Some(groups) => groups
                .iter()
                .map(|group| {
                    if model.group(group.name).is_none() {
                        return Err(Error::invalid_hyperparameter(
                            "update_params",
                            &format!("model has no parameter group '{}'", group.name),
                        ));
                    }
                    let lr = group.learning_rate.unwrap_or(base);
                    if !(lr.is_finite() && lr > 0.0) {
                        return Err(Error::invalid_hyperparameter(
                            group.name,
                            &format!("learning rate {lr} must be positive and finite"),
                        ));
                    }
                    Ok((group.name, lr))
                })
                .collect(),
        }
    }

    fn step<M: Learnable>(
        &self,
        model: &mut M,
        groups: &[(&'static str, f64)],
        gradient: &Gradient,
        factor: f64,
    ) -> Result<()> {
        for &(name, lr) in groups {
            let grad = gradient.get(name).ok_or_else(|| {
                Error::Computation(format!("criterion returned no gradient for '{name}'"))
            })?;
            let params = model.group_mut(name).ok_or_else(|| {
                Error::invalid_hyperparameter("update_params", &format!("unknown group '{name}'"))
            })?;
            if params.len() != grad.len() {
                return Err(Error::shape_mismatch(params.len(), grad.len()));
            }
            for (p, g) in params.iter_mut().zip(grad.iter()) {
                *p -= lr * factor * g;
            }
        }
        Ok(())
    }

    fn validate<M, C, H>(
        &self,
        model: &mut M,
        loader: &DataLoader,
        criterion: &C,
        hook: &H,
        iteration: usize,
        rng: &mut dyn RngCore,
    ) -> Result<f64>
    where
        C: Criterion<M> + ?Sized,
        H: IterationHook<M> + ?Sized,
    {
        let mut loss_sum = 0.0;
        let mut count = 0usize;
        for batch in loader.batches(rng) {
            let target: Option<&DMatrix<f64>> = batch.target.as_ref();
            loss_sum += criterion.evaluate(model, &batch.input, target)?;
            count += 1;
            hook.on_iteration(model, iteration, Phase::Validation, &batch.input, target)?;
        }
        Ok(if count == 0 { f64::NAN } else { loss_sum / count as f64 })
    }
}
