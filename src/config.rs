//! Simulator configuration.

use crate::error::{EnvError, EnvResult};
use serde::{Deserialize, Serialize};

/// Parameters shared by the generator and the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Number of nodes per instance
    pub num_loc: usize,
    /// Lower bound for raw edge weights (before closure)
    pub min_dist: f64,
    /// Upper bound for raw edge weights (before closure)
    pub max_dist: f64,
    /// Seed for reproducible generation; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            num_loc: 10,
            min_dist: 0.0,
            max_dist: 1.0,
            seed: None,
        }
    }
}

impl EnvConfig {
    pub fn new(num_loc: usize, min_dist: f64, max_dist: f64) -> Self {
        EnvConfig {
            num_loc,
            min_dist,
            max_dist,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject anything the generator or the transition function cannot honour.
    pub fn validate(&self) -> EnvResult<()> {
        validate_bounds(self.num_loc, self.min_dist, self.max_dist)
    }
}

pub(crate) fn validate_bounds(num_loc: usize, min_dist: f64, max_dist: f64) -> EnvResult<()> {
    if num_loc == 0 {
        return Err(EnvError::config("num_loc must be positive"));
    }
    if !min_dist.is_finite() || !max_dist.is_finite() {
        return Err(EnvError::config(format!(
            "distance bounds must be finite (got [{}, {}])",
            min_dist, max_dist
        )));
    }
    if min_dist < 0.0 {
        return Err(EnvError::config(format!(
            "min_dist must be non-negative (got {})",
            min_dist
        )));
    }
    if min_dist > max_dist {
        return Err(EnvError::config(format!(
            "min_dist ({}) is greater than max_dist ({})",
            min_dist, max_dist
        )));
    }
    Ok(())
}

pub(crate) fn validate_batch_size(batch_size: usize) -> EnvResult<()> {
    if batch_size == 0 {
        return Err(EnvError::config("batch_size must be positive"));
    }
    Ok(())
}
