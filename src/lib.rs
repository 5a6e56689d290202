//! ATSP Environment Library
//!
//! A batched simulator for building tours on the Asymmetric Traveling
//! Salesman Problem, meant to train and evaluate construction policies.
//!
//! # Features
//!
//! - Random instance generation with metric closure (triangle inequality holds)
//! - Per-instance episode state with a legal-action mask
//! - Lock-step batched transitions, parallel across instances
//! - Tour validation and scoring once an episode completes
//! - Held-out datasets, baseline policies and an evaluation harness
//!
//! # Example
//!
//! ```no_run
//! use atsp_env::{AtspEnv, EnvConfig};
//! use atsp_env::policy::{rollout, GreedyPolicy};
//!
//! let mut env = AtspEnv::new(EnvConfig::new(20, 0.0, 1.0).with_seed(1234)).unwrap();
//! let mut batch = env.reset(128).unwrap();
//!
//! let result = rollout(&env, &mut batch, &GreedyPolicy::new(), 0).unwrap();
//! let mean = result.costs.iter().sum::<f64>() / result.costs.len() as f64;
//! println!("Greedy mean cost: {:.4}", mean);
//! ```

pub mod config;
pub mod dataset;
pub mod env;
pub mod error;
pub mod evaluation;
pub mod generator;
pub mod instance;
pub mod policy;
pub mod reward;
pub mod state;

pub use config::EnvConfig;
pub use env::{AtspEnv, StepOutput};
pub use error::{EnvError, EnvResult};
pub use instance::DistanceMatrix;
pub use state::{AtspBatch, EpisodePhase, EpisodeState};
