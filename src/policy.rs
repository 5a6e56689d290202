//! Baseline policies and episode rollout.
//!
//! These drive episodes end to end through [`AtspEnv::step`] and give
//! reference costs for learned policies to be compared against.

use crate::env::AtspEnv;
use crate::error::{EnvError, EnvResult};
use crate::instance::DistanceMatrix;
use crate::state::{AtspBatch, EpisodePhase, EpisodeState};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Chooses the next node of one episode.
pub trait Policy: Send + Sync {
    /// Return a legal node, or `None` if the episode is finished.
    fn select(
        &self,
        distance: &DistanceMatrix,
        state: &EpisodeState,
        rng: &mut ChaCha8Rng,
    ) -> Option<usize>;

    fn name(&self) -> &str;
}

/// Uniformly random legal node
#[derive(Debug, Clone, Default)]
pub struct RandomPolicy;

impl Policy for RandomPolicy {
    fn select(
        &self,
        _distance: &DistanceMatrix,
        state: &EpisodeState,
        rng: &mut ChaCha8Rng,
    ) -> Option<usize> {
        state.legal_actions().choose(rng)
    }

    fn name(&self) -> &str {
        "Random"
    }
}

/// Nearest-neighbour construction under the scoring convention.
///
/// The scorer charges `d[next][current]` for each new node, so the greedy
/// choice minimises that backward edge.
#[derive(Debug, Clone)]
pub struct GreedyPolicy {
    pub start_node: usize,
}

impl GreedyPolicy {
    pub fn new() -> Self {
        GreedyPolicy { start_node: 0 }
    }

    pub fn starting_at(start_node: usize) -> Self {
        GreedyPolicy { start_node }
    }
}

impl Default for GreedyPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for GreedyPolicy {
    fn select(
        &self,
        distance: &DistanceMatrix,
        state: &EpisodeState,
        _rng: &mut ChaCha8Rng,
    ) -> Option<usize> {
        if state.step_index() == 0 && state.is_legal(self.start_node) {
            return Some(self.start_node);
        }
        let current = state.current_node();
        state
            .legal_actions()
            .min_by_key(|&j| OrderedFloat(distance.distance(j, current)))
    }

    fn name(&self) -> &str {
        "Greedy"
    }
}

/// Completed tours of a batch together with their costs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rollout {
    pub tours: Vec<Vec<usize>>,
    pub costs: Vec<f64>,
}

/// Step `batch` with `policy` until every instance is terminal, then score it.
///
/// Instance `i` draws from stream `i` of a generator seeded with `seed`, so
/// the result does not depend on how rayon schedules the batch.
pub fn rollout(
    env: &AtspEnv,
    batch: &mut AtspBatch,
    policy: &dyn Policy,
    seed: u64,
) -> EnvResult<Rollout> {
    let mut rngs: Vec<ChaCha8Rng> = (0..batch.batch_size())
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(i as u64);
            rng
        })
        .collect();

    while !batch.all_done() {
        let actions = batch
            .episodes()
            .par_iter()
            .zip(batch.distances().par_iter())
            .zip(rngs.par_iter_mut())
            .enumerate()
            .map(|(instance, ((episode, distance), rng))| {
                policy
                    .select(distance, episode, rng)
                    .ok_or(EnvError::EpisodeFinished { instance })
            })
            .collect::<EnvResult<Vec<usize>>>()?;
        env.step(batch, &actions)?;
    }

    let costs = env.score(batch)?;
    log::debug!(
        "{} rollout finished on {} instances",
        policy.name(),
        batch.batch_size()
    );
    Ok(Rollout {
        tours: batch.tours(),
        costs,
    })
}

/// Greedy rollout from every start node, keeping the cheapest tour per instance.
///
/// `batch` must not have been stepped yet.
pub fn multi_start_greedy(env: &AtspEnv, batch: &AtspBatch) -> EnvResult<Rollout> {
    if let Some(instance) = batch
        .episodes()
        .iter()
        .position(|ep| ep.phase() != EpisodePhase::Ready)
    {
        return Err(EnvError::config(format!(
            "multi-start rollout needs a freshly reset batch (instance {} already stepped)",
            instance
        )));
    }

    let mut best: Option<Rollout> = None;
    for start in 0..env.num_loc() {
        let mut attempt = batch.clone();
        let result = rollout(env, &mut attempt, &GreedyPolicy::starting_at(start), 0)?;
        best = Some(match best {
            None => result,
            Some(mut current) => {
                for i in 0..current.costs.len() {
                    if result.costs[i] < current.costs[i] {
                        current.costs[i] = result.costs[i];
                        current.tours[i] = result.tours[i].clone();
                    }
                }
                current
            }
        });
    }

    best.ok_or_else(|| EnvError::config("multi-start rollout needs at least one node"))
}

/// Baselines selectable from the command line and the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Baseline {
    Random,
    Greedy,
    MultiStartGreedy,
}

impl Baseline {
    pub fn all() -> Vec<Baseline> {
        vec![Baseline::Random, Baseline::Greedy, Baseline::MultiStartGreedy]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Baseline::Random => "Random",
            Baseline::Greedy => "Greedy",
            Baseline::MultiStartGreedy => "MultiStartGreedy",
        }
    }

    /// Run this baseline on a freshly reset batch.
    pub fn run(&self, env: &AtspEnv, batch: &mut AtspBatch, seed: u64) -> EnvResult<Rollout> {
        match self {
            Baseline::Random => rollout(env, batch, &RandomPolicy, seed),
            Baseline::Greedy => rollout(env, batch, &GreedyPolicy::new(), seed),
            Baseline::MultiStartGreedy => multi_start_greedy(env, batch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::reward::score;

    fn env(num_loc: usize) -> AtspEnv {
        AtspEnv::new(EnvConfig::new(num_loc, 0.0, 1.0).with_seed(1)).unwrap()
    }

    #[test]
    fn test_random_rollout_produces_permutations() {
        let mut env = env(9);
        let mut batch = env.reset(16).unwrap();
        let result = rollout(&env, &mut batch, &RandomPolicy, 5).unwrap();

        assert_eq!(result.tours.len(), 16);
        for (tour, (distance, &cost)) in result
            .tours
            .iter()
            .zip(batch.distances().iter().zip(result.costs.iter()))
        {
            let mut sorted = tour.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..9).collect::<Vec<_>>());
            assert_eq!(score(distance, tour).unwrap(), cost);
        }
    }

    #[test]
    fn test_random_rollout_is_reproducible() {
        let mut env = env(7);
        let batch = env.reset(8).unwrap();

        let a = rollout(&env, &mut batch.clone(), &RandomPolicy, 11).unwrap();
        let b = rollout(&env, &mut batch.clone(), &RandomPolicy, 11).unwrap();
        assert_eq!(a.tours, b.tours);
    }

    #[test]
    fn test_greedy_follows_cheapest_backward_edge() {
        // From 0 the backward edges d[j][0] are 1 (j=1), 5 (j=2), 2 (j=3).
        let d = DistanceMatrix::from_rows(vec![
            vec![0.0, 9.0, 9.0, 9.0],
            vec![1.0, 0.0, 4.0, 9.0],
            vec![5.0, 9.0, 0.0, 1.0],
            vec![2.0, 3.0, 9.0, 0.0],
        ])
        .unwrap();
        let mut env = env(4);
        let mut batch = env.reset_with(vec![d]).unwrap();
        let result = rollout(&env, &mut batch, &GreedyPolicy::new(), 0).unwrap();

        // 0, then 1 (d[1][0]=1), then 3 (d[3][1]=3 beats d[2][1]=9), then 2
        assert_eq!(result.tours[0], vec![0, 1, 3, 2]);
        assert_eq!(result.costs[0], 9.0 + 1.0 + 3.0 + 1.0);
    }

    #[test]
    fn test_multi_start_is_no_worse_than_greedy() {
        let mut env = env(8);
        let batch = env.reset(12).unwrap();

        let greedy = rollout(&env, &mut batch.clone(), &GreedyPolicy::new(), 0).unwrap();
        let multi = multi_start_greedy(&env, &batch).unwrap();
        for (m, g) in multi.costs.iter().zip(greedy.costs.iter()) {
            assert!(m <= g);
        }
    }

    #[test]
    fn test_multi_start_rejects_stepped_batch() {
        let mut env = env(3);
        let mut batch = env.reset(1).unwrap();
        env.step(&mut batch, &[0]).unwrap();
        assert!(multi_start_greedy(&env, &batch).is_err());
    }
}
