//! Held-out collections of generated instances.
//!
//! A dataset is just a list of matrices plus the parameters that produced
//! them, so evaluation runs can be repeated on exactly the same instances.

use crate::config::EnvConfig;
use crate::error::{EnvError, EnvResult};
use crate::generator::MetricGenerator;
use crate::instance::DistanceMatrix;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtspDataset {
    pub num_loc: usize,
    pub min_dist: f64,
    pub max_dist: f64,
    pub seed: Option<u64>,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    pub matrices: Vec<DistanceMatrix>,
}

impl AtspDataset {
    /// Generate `size` instances with `config`.
    pub fn generate(config: &EnvConfig, size: usize) -> EnvResult<Self> {
        config.validate()?;
        let generator = MetricGenerator::new(config.num_loc, config.min_dist, config.max_dist)?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let matrices = generator.generate(size, &mut rng)?;
        log::info!("generated dataset of {} instances (n={})", size, config.num_loc);

        Ok(AtspDataset {
            num_loc: config.num_loc,
            min_dist: config.min_dist,
            max_dist: config.max_dist,
            seed: config.seed,
            created_at: chrono::Utc::now().to_rfc3339(),
            matrices,
        })
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Config matching the generation parameters of this dataset
    pub fn config(&self) -> EnvConfig {
        EnvConfig {
            num_loc: self.num_loc,
            min_dist: self.min_dist,
            max_dist: self.max_dist,
            seed: self.seed,
        }
    }

    /// Consecutive chunks of at most `batch_size` matrices, in order.
    pub fn batches(&self, batch_size: usize) -> EnvResult<std::slice::Chunks<'_, DistanceMatrix>> {
        crate::config::validate_batch_size(batch_size)?;
        Ok(self.matrices.chunks(batch_size))
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> EnvResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Load a dataset and re-check every matrix.
    pub fn load_json<P: AsRef<Path>>(path: P) -> EnvResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let dataset: AtspDataset = serde_json::from_reader(reader)?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn validate(&self) -> EnvResult<()> {
        for (i, matrix) in self.matrices.iter().enumerate() {
            matrix.validate()?;
            if matrix.dimension() != self.num_loc {
                return Err(EnvError::invalid_matrix(format!(
                    "dataset entry {} has {} nodes, expected {}",
                    i,
                    matrix.dimension(),
                    self.num_loc
                )));
            }
        }
        Ok(())
    }

    pub fn statistics(&self) -> DatasetStatistics {
        let per_matrix: Vec<_> = self.matrices.iter().map(DistanceMatrix::statistics).collect();
        let count = per_matrix.len().max(1) as f64;

        DatasetStatistics {
            size: self.matrices.len(),
            num_loc: self.num_loc,
            avg_distance: per_matrix.iter().map(|s| s.avg_distance).sum::<f64>() / count,
            min_distance: per_matrix
                .iter()
                .map(|s| s.min_distance)
                .reduce(f64::min)
                .unwrap_or(0.0),
            max_distance: per_matrix.iter().map(|s| s.max_distance).fold(0.0, f64::max),
            avg_asymmetry: per_matrix.iter().map(|s| s.max_asymmetry).sum::<f64>() / count,
            num_metric: per_matrix.iter().filter(|s| s.metric).count(),
        }
    }
}

/// Aggregate statistics over a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub size: usize,
    pub num_loc: usize,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Mean over instances of the largest `|d[i][j] - d[j][i]|`
    pub avg_asymmetry: f64,
    /// Instances satisfying the triangle inequality
    pub num_metric: usize,
}

impl std::fmt::Display for DatasetStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dataset: {} instances of {} nodes", self.size, self.num_loc)?;
        writeln!(f, "  Avg distance: {:.4}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.4}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.4}", self.max_distance)?;
        writeln!(f, "  Avg max asymmetry: {:.4}", self.avg_asymmetry)?;
        writeln!(f, "  Metric instances: {}/{}", self.num_metric, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_batch() {
        let config = EnvConfig::new(6, 0.0, 1.0).with_seed(3);
        let dataset = AtspDataset::generate(&config, 10).unwrap();
        assert_eq!(dataset.len(), 10);
        assert_eq!(dataset.config(), config);

        let sizes: Vec<usize> = dataset.batches(4).unwrap().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert!(dataset.batches(0).is_err());

        let stats = dataset.statistics();
        assert_eq!(stats.num_metric, 10);
        assert!(stats.max_distance <= 1.0);
    }

    #[test]
    fn test_json_round_trip() {
        let config = EnvConfig::new(4, 0.0, 1.0).with_seed(9);
        let dataset = AtspDataset::generate(&config, 3).unwrap();

        let path = std::env::temp_dir().join(format!("atsp_dataset_{}.json", std::process::id()));
        dataset.save_json(&path).unwrap();
        let loaded = AtspDataset::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_empty_dataset_statistics() {
        let mut dataset = AtspDataset::generate(&EnvConfig::new(4, 0.0, 1.0).with_seed(9), 1).unwrap();
        dataset.matrices.clear();
        assert!(dataset.validate().is_ok());

        let stats = dataset.statistics();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.min_distance, 0.0);
        assert_eq!(stats.max_distance, 0.0);
        assert_eq!(stats.avg_distance, 0.0);
    }

    #[test]
    fn test_load_rejects_wrong_dimension() {
        let config = EnvConfig::new(4, 0.0, 1.0).with_seed(9);
        let mut dataset = AtspDataset::generate(&config, 2).unwrap();
        dataset.num_loc = 5;
        assert!(matches!(dataset.validate(), Err(EnvError::InvalidMatrix { .. })));
    }
}
