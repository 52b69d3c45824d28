//! Mini-batch loaders over the observed sample

use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::RngCore;
use truncated_core::{Error, EstimatorConfig, Result};

/// One mini-batch: `input` rows with their optional `target` rows
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub input: DMatrix<f64>,
    pub target: Option<DMatrix<f64>>,
}

/// Yields mini-batches of a fixed sample, reshuffled on every pass
#[derive(Debug, Clone, PartialEq)]
pub struct DataLoader {
    input: DMatrix<f64>,
    target: Option<DMatrix<f64>>,
    batch_size: usize,
    shuffle: bool,
}

impl DataLoader {
    pub fn new(
        input: DMatrix<f64>,
        target: Option<DMatrix<f64>>,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::invalid_hyperparameter("batch_size", "must be at least 1"));
        }
        if let Some(target) = &target {
            if target.nrows() != input.nrows() {
                return Err(Error::shape_mismatch(input.nrows(), target.nrows()));
            }
        }
        Ok(Self {
            input,
            target,
            batch_size,
            shuffle: true,
        })
    }

    /// Keep the original row order on every pass
    pub fn sequential(mut self) -> Self {
        self.shuffle = false;
        self
    }

    pub fn input(&self) -> &DMatrix<f64> {
        &self.input
    }

    pub fn target(&self) -> Option<&DMatrix<f64>> {
        self.target.as_ref()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.input.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.input.nrows() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches per pass; the last batch may be short
    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    /// One pass over the sample
    pub fn batches(&self, rng: &mut dyn RngCore) -> Vec<Batch> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        order
            .chunks(self.batch_size)
            .map(|rows| Batch {
                input: self.input.select_rows(rows.iter()),
                target: self.target.as_ref().map(|t| t.select_rows(rows.iter())),
            })
            .collect()
    }
}

/// Training loader plus an optional held-out validation loader
#[derive(Debug, Clone, PartialEq)]
pub struct Loaders {
    pub train: DataLoader,
    pub validation: Option<DataLoader>,
}

impl Loaders {
    /// Split the sample by `config.validation_fraction()` after a shuffle
    ///
    /// Both loaders use `config.batch_size()`. A zero fraction, or a sample
    /// too small to hold out a row, yields no validation loader.
    pub fn split(
        input: DMatrix<f64>,
        target: Option<DMatrix<f64>>,
        config: &EstimatorConfig,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        let n = input.nrows();
        if let Some(target) = &target {
            if target.nrows() != n {
                return Err(Error::shape_mismatch(n, target.nrows()));
            }
        }
        let held_out = (n as f64 * config.validation_fraction()).floor() as usize;
        if held_out == 0 || held_out >= n {
            return Ok(Self {
                train: DataLoader::new(input, target, config.batch_size())?,
                validation: None,
            });
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        let (validation_rows, train_rows) = order.split_at(held_out);
        let pick = |m: &DMatrix<f64>, rows: &[usize]| m.select_rows(rows.iter());

        let train = DataLoader::new(
            pick(&input, train_rows),
            target.as_ref().map(|t| pick(t, train_rows)),
            config.batch_size(),
        )?;
        let validation = DataLoader::new(
            pick(&input, validation_rows),
            target.as_ref().map(|t| pick(t, validation_rows)),
            config.batch_size(),
        )?;
        Ok(Self {
            train,
            validation: Some(validation),
        })
    }

    /// All samples in one training loader, no validation
    pub fn train_only(loader: DataLoader) -> Self {
        Self {
            train: loader,
            validation: None,
        }
    }
}
