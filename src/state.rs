//! Per-instance episode state and the transition function.

use crate::error::{EnvError, EnvResult};
use crate::instance::DistanceMatrix;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle of a single episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// Reset, no action taken yet
    Ready,
    /// Between 1 and N-1 actions taken
    InProgress,
    /// Every node visited
    Terminal,
}

/// Visitation state of one batch instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    /// Node chosen by the latest action; 0 before the first action
    current_node: usize,
    /// First node chosen; 0 before the first action
    first_node: usize,
    /// Number of actions taken
    step_index: usize,
    /// `true` = not yet visited, i.e. still a legal action
    action_mask: Vec<bool>,
    /// Actions taken so far, in order
    tour: Vec<usize>,
}

impl EpisodeState {
    /// Fresh state for an instance with `num_loc` nodes.
    ///
    /// The start sentinel (node 0) is not marked visited; it only becomes
    /// visited if the agent actually selects it.
    pub fn new(num_loc: usize) -> Self {
        EpisodeState {
            current_node: 0,
            first_node: 0,
            step_index: 0,
            action_mask: vec![true; num_loc],
            tour: Vec::with_capacity(num_loc),
        }
    }

    pub fn num_loc(&self) -> usize {
        self.action_mask.len()
    }

    pub fn current_node(&self) -> usize {
        self.current_node
    }

    pub fn first_node(&self) -> usize {
        self.first_node
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn action_mask(&self) -> &[bool] {
        &self.action_mask
    }

    pub fn tour(&self) -> &[usize] {
        &self.tour
    }

    #[inline]
    pub fn is_legal(&self, action: usize) -> bool {
        self.action_mask.get(action).copied().unwrap_or(false)
    }

    /// Nodes still available, in index order
    pub fn legal_actions(&self) -> impl Iterator<Item = usize> + '_ {
        self.action_mask
            .iter()
            .enumerate()
            .filter(|(_, legal)| **legal)
            .map(|(node, _)| node)
    }

    pub fn is_done(&self) -> bool {
        !self.action_mask.iter().any(|&legal| legal)
    }

    pub fn phase(&self) -> EpisodePhase {
        if self.is_done() {
            EpisodePhase::Terminal
        } else if self.step_index == 0 {
            EpisodePhase::Ready
        } else {
            EpisodePhase::InProgress
        }
    }

    /// Check that `action` may be applied, without touching the state.
    /// `instance` only labels the error.
    pub fn check_action(&self, instance: usize, action: usize) -> EnvResult<()> {
        if self.is_done() {
            return Err(EnvError::EpisodeFinished { instance });
        }
        if action >= self.num_loc() {
            return Err(EnvError::illegal_action(
                instance,
                action,
                format!("node index out of range 0..{}", self.num_loc()),
            ));
        }
        if !self.action_mask[action] {
            return Err(EnvError::illegal_action(instance, action, "node already visited"));
        }
        Ok(())
    }

    /// Visit `action`. Returns whether the episode is now terminal.
    pub fn apply(&mut self, instance: usize, action: usize) -> EnvResult<bool> {
        self.check_action(instance, action)?;
        if self.step_index == 0 {
            self.first_node = action;
        }
        self.current_node = action;
        self.action_mask[action] = false;
        self.tour.push(action);
        self.step_index += 1;
        Ok(self.is_done())
    }
}

/// Batch of episodes advanced in lock-step, one action per instance per call.
///
/// Each instance pairs its read-only matrix with its own mutable state.
#[derive(Debug, Clone)]
pub struct AtspBatch {
    distances: Vec<Arc<DistanceMatrix>>,
    episodes: Vec<EpisodeState>,
}

impl AtspBatch {
    pub(crate) fn new(distances: Vec<Arc<DistanceMatrix>>) -> Self {
        let episodes = distances
            .iter()
            .map(|d| EpisodeState::new(d.dimension()))
            .collect();
        AtspBatch {
            distances,
            episodes,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.episodes.len()
    }

    pub fn distances(&self) -> &[Arc<DistanceMatrix>] {
        &self.distances
    }

    pub fn episodes(&self) -> &[EpisodeState] {
        &self.episodes
    }

    pub(crate) fn episodes_mut(&mut self) -> &mut [EpisodeState] {
        &mut self.episodes
    }

    pub fn action_masks(&self) -> Vec<Vec<bool>> {
        self.episodes.iter().map(|ep| ep.action_mask.clone()).collect()
    }

    pub fn done(&self) -> Vec<bool> {
        self.episodes.iter().map(EpisodeState::is_done).collect()
    }

    pub fn all_done(&self) -> bool {
        self.episodes.iter().all(EpisodeState::is_done)
    }

    pub fn tours(&self) -> Vec<Vec<usize>> {
        self.episodes.iter().map(|ep| ep.tour.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_is_ready() {
        let state = EpisodeState::new(4);
        assert_eq!(state.phase(), EpisodePhase::Ready);
        assert_eq!(state.action_mask(), &[true; 4]);
        assert_eq!(state.current_node(), 0);
        assert_eq!(state.first_node(), 0);
        assert!(state.is_legal(0));
    }

    #[test]
    fn test_mask_is_monotone_and_counts_steps() {
        let mut state = EpisodeState::new(5);
        let order = [3, 0, 4, 1, 2];
        let mut previous = state.action_mask().to_vec();

        for (step, &action) in order.iter().enumerate() {
            let done = state.apply(0, action).unwrap();
            let mask = state.action_mask().to_vec();

            for node in 0..5 {
                if !previous[node] {
                    assert!(!mask[node], "node {} became legal again", node);
                }
            }
            let visited = mask.iter().filter(|&&legal| !legal).count();
            assert_eq!(visited, state.step_index());
            assert_eq!(done, step + 1 == order.len());
            previous = mask;
        }

        assert_eq!(state.first_node(), 3);
        assert_eq!(state.current_node(), 2);
        assert_eq!(state.tour(), &order);
        assert_eq!(state.phase(), EpisodePhase::Terminal);
    }

    #[test]
    fn test_rejected_action_leaves_state_untouched() {
        let mut state = EpisodeState::new(3);
        state.apply(0, 1).unwrap();
        let before = state.clone();

        assert!(matches!(
            state.apply(0, 1),
            Err(EnvError::IllegalAction { action: 1, .. })
        ));
        assert!(matches!(
            state.apply(0, 9),
            Err(EnvError::IllegalAction { action: 9, .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_terminal_state_rejects_steps() {
        let mut state = EpisodeState::new(1);
        assert!(state.apply(2, 0).unwrap());
        assert!(matches!(
            state.apply(2, 0),
            Err(EnvError::EpisodeFinished { instance: 2 })
        ));
    }
}
