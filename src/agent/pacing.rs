//! Swap amount selection and inter-operation pacing
//!
//! Both take the RNG as an argument so a seeded run is reproducible.

use anyhow::{Context, Result};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::time::Duration;

use crate::config::{SwapConfig, WorkerConfig};

/// Weighted discrete distribution over the candidate swap amounts
#[derive(Debug, Clone)]
pub struct AmountSampler {
    amounts: Vec<u64>,
    index: WeightedIndex<f64>,
}

impl AmountSampler {
    pub fn new(amounts: &[u64], weights: &[f64]) -> Result<Self> {
        anyhow::ensure!(
            amounts.len() == weights.len(),
            "{} amounts but {} weights",
            amounts.len(),
            weights.len()
        );
        let index = WeightedIndex::new(weights.iter().copied()).context("Invalid swap weights")?;
        Ok(Self {
            amounts: amounts.to_vec(),
            index,
        })
    }

    pub fn from_config(config: &SwapConfig) -> Result<Self> {
        Self::new(&config.amounts, &config.weights)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.amounts[self.index.sample(rng)]
    }

    pub fn amounts(&self) -> &[u64] {
        &self.amounts
    }
}

/// Slow down when the wallet keeps failing
pub fn delay_multiplier(failure_rate: f64) -> f64 {
    if failure_rate > 0.5 {
        2.0
    } else if failure_rate > 0.3 {
        1.5
    } else {
        1.0
    }
}

/// Delay bounds for one wallet loop, in seconds
#[derive(Debug, Clone, Copy)]
pub struct DelayPolicy {
    pub min_delay: f64,
    pub max_delay: f64,
    pub min_spacing: f64,
}

impl DelayPolicy {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            min_delay: config.min_delay_secs,
            max_delay: config.max_delay_secs,
            min_spacing: config.min_spacing_secs,
        }
    }

    /// uniform(min, max) scaled by the failure multiplier, never below the
    /// minimum spacing
    pub fn next_delay<R: Rng + ?Sized>(&self, failure_rate: f64, rng: &mut R) -> Duration {
        let base = if self.max_delay > self.min_delay {
            rng.random_range(self.min_delay..=self.max_delay)
        } else {
            self.min_delay
        };
        let secs = (base * delay_multiplier(failure_rate)).max(self.min_spacing);
        Duration::from_secs_f64(secs.max(0.0))
    }
}
