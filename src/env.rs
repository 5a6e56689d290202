//! The ATSP environment: reset, step and score over a batch of episodes.
//!
//! ```
//! use atsp_env::{AtspEnv, EnvConfig};
//!
//! let mut env = AtspEnv::new(EnvConfig::new(4, 0.0, 1.0).with_seed(0)).unwrap();
//! let mut batch = env.reset(2).unwrap();
//! for node in [2, 0, 3, 1] {
//!     env.step(&mut batch, &[node, node]).unwrap();
//! }
//! assert!(batch.all_done());
//! let costs = env.score(&batch).unwrap();
//! assert_eq!(costs.len(), 2);
//! ```

use crate::config::{validate_batch_size, EnvConfig};
use crate::error::{EnvError, EnvResult};
use crate::generator::MetricGenerator;
use crate::instance::DistanceMatrix;
use crate::reward;
use crate::state::AtspBatch;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;

/// Observation returned by [`AtspEnv::step`]
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Legal-action mask per instance after the step
    pub action_mask: Vec<Vec<bool>>,
    /// Whether each instance has visited every node
    pub done: Vec<bool>,
    /// Always `None`: reward only exists for a complete tour, see [`AtspEnv::score`]
    pub reward: Option<Vec<f64>>,
}

/// Batched ATSP tour-construction environment
pub struct AtspEnv {
    config: EnvConfig,
    generator: MetricGenerator,
    rng: ChaCha8Rng,
}

impl AtspEnv {
    pub fn new(config: EnvConfig) -> EnvResult<Self> {
        config.validate()?;
        let generator = MetricGenerator::new(config.num_loc, config.min_dist, config.max_dist)?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(AtspEnv {
            config,
            generator,
            rng,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn num_loc(&self) -> usize {
        self.config.num_loc
    }

    /// Restart the generation stream from `seed`.
    pub fn set_seed(&mut self, seed: u64) {
        self.config.seed = Some(seed);
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Draw `batch_size` metric instances from the env's stream.
    pub fn generate_data(&mut self, batch_size: usize) -> EnvResult<Vec<DistanceMatrix>> {
        self.generator.generate(batch_size, &mut self.rng)
    }

    /// Start `batch_size` episodes on freshly generated instances.
    pub fn reset(&mut self, batch_size: usize) -> EnvResult<AtspBatch> {
        validate_batch_size(batch_size)?;
        let matrices = self.generate_data(batch_size)?;
        self.reset_with(matrices)
    }

    /// Start one episode per supplied matrix.
    ///
    /// Every matrix must have `num_loc` nodes. Supplied matrices are not
    /// closed; pass them through [`crate::generator::metric_closure`] first
    /// if they must be metric.
    pub fn reset_with(&mut self, matrices: Vec<DistanceMatrix>) -> EnvResult<AtspBatch> {
        validate_batch_size(matrices.len())?;
        for (instance, matrix) in matrices.iter().enumerate() {
            matrix.validate()?;
            if matrix.dimension() != self.config.num_loc {
                return Err(EnvError::invalid_matrix(format!(
                    "instance {} has {} nodes, environment expects {}",
                    instance,
                    matrix.dimension(),
                    self.config.num_loc
                )));
            }
            if !matrix.is_metric(1e-9) {
                log::warn!("instance {} violates the triangle inequality", instance);
            }
        }

        log::debug!(
            "reset {} episodes with {} nodes",
            matrices.len(),
            self.config.num_loc
        );
        Ok(AtspBatch::new(matrices.into_iter().map(Arc::new).collect()))
    }

    /// Advance every instance by one action.
    ///
    /// The whole call is checked before anything is applied, so on error no
    /// instance of the batch has been modified.
    pub fn step(&self, batch: &mut AtspBatch, actions: &[usize]) -> EnvResult<StepOutput> {
        if actions.len() != batch.batch_size() {
            return Err(EnvError::config(format!(
                "got {} actions for a batch of {} instances",
                actions.len(),
                batch.batch_size()
            )));
        }
        for (instance, (episode, &action)) in batch.episodes().iter().zip(actions).enumerate() {
            episode.check_action(instance, action)?;
        }

        let done = batch
            .episodes_mut()
            .par_iter_mut()
            .zip(actions.par_iter())
            .enumerate()
            .map(|(instance, (episode, &action))| episode.apply(instance, action))
            .collect::<EnvResult<Vec<bool>>>()?;

        Ok(StepOutput {
            action_mask: batch.action_masks(),
            done,
            reward: None,
        })
    }

    /// Cost of every instance's recorded tour. Fails with `InvalidTour` if
    /// any episode is unfinished.
    pub fn score(&self, batch: &AtspBatch) -> EnvResult<Vec<f64>> {
        reward::score_batch(batch.distances(), &batch.tours())
    }

    /// Cost of externally recorded tours on the given matrices.
    pub fn get_reward<M>(&self, distances: &[M], actions: &[Vec<usize>]) -> EnvResult<Vec<f64>>
    where
        M: AsRef<DistanceMatrix> + Sync,
    {
        reward::score_batch(distances, actions)
    }
}
