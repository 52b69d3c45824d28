//! Immutable estimator configuration
//!
//! One [`EstimatorConfig`] is built per `fit` call and handed by reference to
//! the projector, the gradient estimator and the training loop. Nothing
//! mutates it afterwards, so independent fits never interfere.

use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Learning-rate multiplier applied on top of the per-group rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    /// Multiplier stays at 1
    Constant,
    /// Half-cosine decay from 1 towards 0 over the run
    Cosine,
}

impl LearningRateSchedule {
    /// Multiplier for step `iteration` out of `total` steps
    pub fn factor(&self, iteration: usize, total: usize) -> f64 {
        match self {
            Self::Constant => 1.0,
            Self::Cosine => {
                if total == 0 {
                    return 1.0;
                }
                let progress = iteration.min(total) as f64 / total as f64;
                0.5 * (1.0 + (PI * progress).cos())
            }
        }
    }
}

/// Hyperparameters shared by every component of one fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    alpha: f64,
    radius: f64,
    clamp: bool,
    num_samples: usize,
    max_resample_rounds: usize,
    batch_size: usize,
    learning_rate: f64,
    variance_learning_rate: f64,
    epochs: usize,
    max_iterations: Option<usize>,
    schedule: LearningRateSchedule,
    validation_fraction: f64,
    seed: Option<u64>,
}

impl EstimatorConfig {
    /// Start building a configuration; `alpha` must be supplied
    pub fn builder() -> EstimatorConfigBuilder {
        EstimatorConfigBuilder::default()
    }

    /// Lower bound on the survival probability of the observed region
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Multiplier applied to every confidence radius
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Whether the projector actually clips parameters
    pub fn clamp(&self) -> bool {
        self.clamp
    }

    /// Proposal draws per observed sample in each rejection round
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Cap on rejection rounds per gradient evaluation
    pub fn max_resample_rounds(&self) -> usize {
        self.max_resample_rounds
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Learning rate for inverse-variance parameters
    pub fn variance_learning_rate(&self) -> f64 {
        self.variance_learning_rate
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Optional cap on the number of optimizer steps
    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    pub fn schedule(&self) -> LearningRateSchedule {
        self.schedule
    }

    /// Fraction of observed samples held out for validation passes
    pub fn validation_fraction(&self) -> f64 {
        self.validation_fraction
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Random generator for one fit, seeded when a seed is configured
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Copy of this configuration with a different survival bound
    pub fn with_alpha(&self, alpha: f64) -> Result<Self> {
        validate_alpha(alpha)?;
        Ok(Self {
            alpha,
            ..self.clone()
        })
    }
}

/// Builder for [`EstimatorConfig`]
#[derive(Debug, Clone)]
pub struct EstimatorConfigBuilder {
    alpha: Option<f64>,
    radius: f64,
    clamp: bool,
    num_samples: usize,
    max_resample_rounds: usize,
    batch_size: usize,
    learning_rate: f64,
    variance_learning_rate: f64,
    epochs: usize,
    max_iterations: Option<usize>,
    schedule: LearningRateSchedule,
    validation_fraction: f64,
    seed: Option<u64>,
}

impl Default for EstimatorConfigBuilder {
    fn default() -> Self {
        Self {
            alpha: None,
            radius: 2.0,
            clamp: true,
            num_samples: 10,
            max_resample_rounds: 10_000,
            batch_size: 100,
            learning_rate: 0.1,
            variance_learning_rate: 0.01,
            epochs: 10,
            max_iterations: None,
            schedule: LearningRateSchedule::Cosine,
            validation_fraction: 0.0,
            seed: None,
        }
    }
}

impl EstimatorConfigBuilder {
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    pub fn max_resample_rounds(mut self, rounds: usize) -> Self {
        self.max_resample_rounds = rounds;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn variance_learning_rate(mut self, learning_rate: f64) -> Self {
        self.variance_learning_rate = learning_rate;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn schedule(mut self, schedule: LearningRateSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = fraction;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<EstimatorConfig> {
        let alpha = self
            .alpha
            .ok_or_else(|| Error::invalid_hyperparameter("alpha", "is required"))?;
        validate_alpha(alpha)?;
        positive_finite("radius", self.radius)?;
        positive_finite("learning_rate", self.learning_rate)?;
        positive_finite("variance_learning_rate", self.variance_learning_rate)?;
        positive_count("num_samples", self.num_samples)?;
        positive_count("max_resample_rounds", self.max_resample_rounds)?;
        positive_count("batch_size", self.batch_size)?;
        positive_count("epochs", self.epochs)?;
        if let Some(max_iterations) = self.max_iterations {
            positive_count("max_iterations", max_iterations)?;
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(Error::invalid_hyperparameter(
                "validation_fraction",
                "must be in [0, 1)",
            ));
        }

        Ok(EstimatorConfig {
            alpha,
            radius: self.radius,
            clamp: self.clamp,
            num_samples: self.num_samples,
            max_resample_rounds: self.max_resample_rounds,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            variance_learning_rate: self.variance_learning_rate,
            epochs: self.epochs,
            max_iterations: self.max_iterations,
            schedule: self.schedule,
            validation_fraction: self.validation_fraction,
            seed: self.seed,
        })
    }
}

fn validate_alpha(alpha: f64) -> Result<()> {
    if alpha.is_finite() && alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(Error::invalid_hyperparameter(
            "alpha",
            &format!("survival probability {alpha} must be in (0, 1]"),
        ))
    }
}

fn positive_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_hyperparameter(
            name,
            &format!("{value} must be positive and finite"),
        ))
    }
}

fn positive_count(name: &str, value: usize) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(Error::invalid_hyperparameter(name, "must be at least 1"))
    }
}
