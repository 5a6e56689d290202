//! Evaluation of baseline policies on held-out datasets.
//!
//! Runs each policy over every batch of a dataset, collects per-instance
//! costs, aggregates them, and exports results as CSV and a text report.

use crate::dataset::AtspDataset;
use crate::env::AtspEnv;
use crate::error::EnvResult;
use crate::policy::Baseline;

use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Max, Min, OrderStatistics};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// Cost of one policy on one dataset instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResult {
    /// Policy name
    pub policy: String,
    /// Index of the instance in the dataset
    pub instance: usize,
    /// Number of nodes
    pub num_loc: usize,
    /// Tour cost
    pub cost: f64,
    /// Wall time of the batch this instance was solved in, divided by its size
    pub time: f64,
    /// Gap to the best policy on this instance, in percent
    pub gap_to_best: Option<f64>,
}

/// Aggregated statistics for a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStatistics {
    pub policy: String,
    pub num_instances: usize,
    pub avg_cost: f64,
    pub std_cost: f64,
    pub median_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    pub avg_time: f64,
    pub total_time: f64,
    /// Average gap to the best policy per instance, in percent
    pub avg_gap: Option<f64>,
}

/// Evaluation configuration
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Instances per environment batch
    pub batch_size: usize,
    /// Seed for stochastic policies
    pub seed: u64,
    /// Policies to run
    pub baselines: Vec<Baseline>,
    /// Show a progress bar
    pub show_progress: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            batch_size: 64,
            seed: 42,
            baselines: Baseline::all(),
            show_progress: false,
        }
    }
}

/// Evaluation engine
pub struct Evaluator {
    config: EvaluationConfig,
    results: Vec<PolicyResult>,
}

impl Evaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Evaluator {
            config,
            results: Vec::new(),
        }
    }

    /// Run every configured policy over `dataset`.
    ///
    /// Results of a previous run are discarded; gaps only compare policies
    /// on the same instance of the same dataset.
    pub fn run(&mut self, dataset: &AtspDataset) -> EnvResult<()> {
        self.results.clear();
        let mut env = AtspEnv::new(dataset.config())?;
        let num_batches = dataset.len().div_ceil(self.config.batch_size.max(1));
        let progress = self.progress_bar((num_batches * self.config.baselines.len()) as u64);

        for baseline in self.config.baselines.clone() {
            log::info!("evaluating {} on {} instances", baseline.name(), dataset.len());
            let mut offset = 0;

            for (b, chunk) in dataset.batches(self.config.batch_size)?.enumerate() {
                let mut batch = env.reset_with(chunk.to_vec())?;
                let start = Instant::now();
                let rollout = baseline.run(&env, &mut batch, self.config.seed.wrapping_add(b as u64))?;
                let per_instance = start.elapsed().as_secs_f64() / chunk.len() as f64;

                for (i, &cost) in rollout.costs.iter().enumerate() {
                    self.results.push(PolicyResult {
                        policy: baseline.name().to_string(),
                        instance: offset + i,
                        num_loc: dataset.num_loc,
                        cost,
                        time: per_instance,
                        gap_to_best: None,
                    });
                }
                offset += chunk.len();
                progress.inc(1);
            }
        }

        progress.finish_and_clear();
        self.update_gaps();
        Ok(())
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} batches")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }

    /// Fill `gap_to_best` from the cheapest cost recorded per instance.
    fn update_gaps(&mut self) {
        let mut best: HashMap<usize, f64> = HashMap::new();
        for result in &self.results {
            let entry = best.entry(result.instance).or_insert(result.cost);
            if result.cost < *entry {
                *entry = result.cost;
            }
        }

        for result in &mut self.results {
            result.gap_to_best = best
                .get(&result.instance)
                .filter(|&&b| b > 0.0)
                .map(|&b| (result.cost - b) / b * 100.0);
        }
    }

    /// Compute statistics for each policy, best average cost first
    pub fn compute_statistics(&self) -> Vec<PolicyStatistics> {
        let mut by_policy: HashMap<&str, Vec<&PolicyResult>> = HashMap::new();
        for result in &self.results {
            by_policy.entry(result.policy.as_str()).or_default().push(result);
        }

        let mut statistics: Vec<PolicyStatistics> = by_policy
            .into_iter()
            .map(|(policy, results)| {
                let costs: Vec<f64> = results.iter().map(|r| r.cost).collect();
                let times: Vec<f64> = results.iter().map(|r| r.time).collect();
                let gaps: Vec<f64> = results.iter().filter_map(|r| r.gap_to_best).collect();

                let mut data = Data::new(costs);
                let avg_cost = data.mean().unwrap_or(f64::NAN);
                let std_cost = data.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0);
                let median_cost = data.median();
                let best_cost = data.min();
                let worst_cost = data.max();

                let total_time = times.iter().sum::<f64>();
                let avg_time = total_time / times.len().max(1) as f64;

                let avg_gap = if gaps.is_empty() {
                    None
                } else {
                    Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
                };

                PolicyStatistics {
                    policy: policy.to_string(),
                    num_instances: results.len(),
                    avg_cost,
                    std_cost,
                    median_cost,
                    best_cost,
                    worst_cost,
                    avg_time,
                    total_time,
                    avg_gap,
                }
            })
            .collect();

        statistics.sort_by_key(|s| OrderedFloat(s.avg_cost));
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> EnvResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> EnvResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       ATSP Baseline Evaluation\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        report.push_str("Policy Performance Summary:\n");
        report.push_str("-".repeat(88).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>10} {:>12} {:>10} {:>12} {:>10} {:>10}\n",
            "Policy", "Instances", "Avg Cost", "Std", "Median", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(88).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:<20} {:>10} {:>12.4} {:>10.4} {:>12.4} {:>10} {:>10.6}\n",
                stat.policy,
                stat.num_instances,
                stat.avg_cost,
                stat.std_cost,
                stat.median_cost,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(88).as_str());
        report.push('\n');
        report
    }

    /// Get all results
    pub fn results(&self) -> &[PolicyResult] {
        &self.results
    }
}
