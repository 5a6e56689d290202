//! ATSP Environment - Command Line Interface
//!
//! Generate held-out ATSP datasets and evaluate baseline policies on them.

use atsp_env::dataset::AtspDataset;
use atsp_env::evaluation::{EvaluationConfig, Evaluator};
use atsp_env::policy::Baseline;
use atsp_env::{EnvConfig, EnvResult};
use clap::{Parser, Subcommand, ValueEnum};

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "atsp-env")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Batched ATSP tour-construction simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a dataset of metric ATSP instances
    Generate {
        /// Number of nodes per instance
        #[arg(short, long, default_value = "10")]
        num_loc: usize,

        /// Number of instances
        #[arg(short, long, default_value = "1000")]
        size: usize,

        /// Lower bound of raw edge weights
        #[arg(long, default_value = "0.0")]
        min_dist: f64,

        /// Upper bound of raw edge weights
        #[arg(long, default_value = "1.0")]
        max_dist: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Evaluate baseline policies
    Evaluate {
        /// Dataset JSON file; generated on the fly when absent
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Number of nodes (on-the-fly generation only)
        #[arg(short, long, default_value = "10")]
        num_loc: usize,

        /// Number of instances (on-the-fly generation only)
        #[arg(short, long, default_value = "1000")]
        size: usize,

        /// Lower bound of raw edge weights (on-the-fly generation only)
        #[arg(long, default_value = "0.0")]
        min_dist: f64,

        /// Upper bound of raw edge weights (on-the-fly generation only)
        #[arg(long, default_value = "1.0")]
        max_dist: f64,

        /// Random seed for generation and stochastic policies
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Policy to evaluate
        #[arg(short, long, value_enum, default_value = "all")]
        policy: PolicyArg,

        /// Instances per environment batch
        #[arg(short, long, default_value = "64")]
        batch_size: usize,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Print statistics of a dataset
    Analyze {
        /// Dataset JSON file
        #[arg(short, long)]
        dataset: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum PolicyArg {
    /// Uniformly random legal node
    Random,
    /// Cheapest backward edge from node 0
    Greedy,
    /// Greedy from every start node, best tour kept
    MultiStart,
    /// All of the above
    All,
}

impl PolicyArg {
    fn baselines(self) -> Vec<Baseline> {
        match self {
            PolicyArg::Random => vec![Baseline::Random],
            PolicyArg::Greedy => vec![Baseline::Greedy],
            PolicyArg::MultiStart => vec![Baseline::MultiStartGreedy],
            PolicyArg::All => Baseline::all(),
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Generate { num_loc, size, min_dist, max_dist, seed, output } => {
            generate_dataset(num_loc, size, min_dist, max_dist, seed, &output)
        }

        Commands::Evaluate {
            dataset,
            num_loc,
            size,
            min_dist,
            max_dist,
            seed,
            policy,
            batch_size,
            output,
        } => {
            let generation = EnvConfig::new(num_loc, min_dist, max_dist).with_seed(seed);
            evaluate(dataset.as_deref(), &generation, size, policy, batch_size, &output)
        }

        Commands::Analyze { dataset } => analyze_dataset(&dataset),
    };

    if let Err(e) = outcome {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn generate_dataset(
    num_loc: usize,
    size: usize,
    min_dist: f64,
    max_dist: f64,
    seed: u64,
    output: &Path,
) -> EnvResult<()> {
    let config = EnvConfig::new(num_loc, min_dist, max_dist).with_seed(seed);
    println!("Generating {} instances with {} nodes...", size, num_loc);

    let start = Instant::now();
    let dataset = AtspDataset::generate(&config, size)?;
    println!("Generated in {:.4}s", start.elapsed().as_secs_f64());

    dataset.save_json(output)?;
    println!("Dataset saved to {:?}", output);
    Ok(())
}

fn evaluate(
    dataset_path: Option<&Path>,
    generation: &EnvConfig,
    size: usize,
    policy: PolicyArg,
    batch_size: usize,
    output: &Path,
) -> EnvResult<()> {
    let dataset = match dataset_path {
        Some(path) => {
            println!("Loading dataset from {:?}...", path);
            AtspDataset::load_json(path)?
        }
        None => {
            println!(
                "Generating {} instances with {} nodes, weights in [{}, {})...",
                size, generation.num_loc, generation.min_dist, generation.max_dist
            );
            AtspDataset::generate(generation, size)?
        }
    };

    std::fs::create_dir_all(output)?;

    let config = EvaluationConfig {
        batch_size,
        seed: generation.seed.unwrap_or_default(),
        baselines: policy.baselines(),
        show_progress: true,
    };
    let mut evaluator = Evaluator::new(config);

    let start = Instant::now();
    evaluator.run(&dataset)?;
    println!(
        "Evaluated {} instances in {:.4}s",
        dataset.len(),
        start.elapsed().as_secs_f64()
    );

    let results_path = output.join("results.csv");
    evaluator.export_to_csv(&results_path)?;
    println!("Results exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    evaluator.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = evaluator.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);
    Ok(())
}

fn analyze_dataset(path: &Path) -> EnvResult<()> {
    let dataset = AtspDataset::load_json(path)?;

    println!("========== Dataset Analysis ==========\n");
    println!(
        "Parameters: num_loc={}, dist=[{}, {}], seed={:?}, created {}",
        dataset.num_loc, dataset.min_dist, dataset.max_dist, dataset.seed, dataset.created_at
    );
    println!("{}", dataset.statistics());

    if let Some(first) = dataset.matrices.first() {
        println!("First instance:");
        println!("{}", first.statistics());
        if let Some((i, j, k)) = first.first_triangle_violation(1e-9) {
            println!("  Violation: d[{i}][{j}] > d[{i}][{k}] + d[{k}][{j}]");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_accepts_weight_bounds() {
        let cli = Cli::try_parse_from([
            "atsp-env", "evaluate", "--min-dist", "2.5", "--max-dist", "7", "--num-loc", "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Evaluate { min_dist, max_dist, num_loc, .. } => {
                assert_eq!(min_dist, 2.5);
                assert_eq!(max_dist, 7.0);
                assert_eq!(num_loc, 5);
            }
            _ => panic!("expected the evaluate subcommand"),
        }
    }

    #[test]
    fn test_evaluate_bounds_default_to_unit_interval() {
        let cli = Cli::try_parse_from(["atsp-env", "evaluate"]).unwrap();
        match cli.command {
            Commands::Evaluate { min_dist, max_dist, .. } => {
                assert_eq!((min_dist, max_dist), (0.0, 1.0));
            }
            _ => panic!("expected the evaluate subcommand"),
        }
    }
}
