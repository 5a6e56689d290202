//! Directed distance matrices for ATSP instances.
//!
//! A matrix is square, finite, non-negative, with a zero diagonal. It may be
//! asymmetric. Once an episode starts it is shared read-only behind an `Arc`.

use crate::error::{EnvError, EnvResult};
use serde::{Deserialize, Serialize};

/// N x N directed edge weights of a single instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDistanceMatrix")]
pub struct DistanceMatrix {
    dimension: usize,
    rows: Vec<Vec<f64>>,
}

/// Serialized form, checked before it becomes a [`DistanceMatrix`]
#[derive(Deserialize)]
struct RawDistanceMatrix {
    dimension: usize,
    rows: Vec<Vec<f64>>,
}

impl TryFrom<RawDistanceMatrix> for DistanceMatrix {
    type Error = EnvError;

    fn try_from(raw: RawDistanceMatrix) -> EnvResult<Self> {
        let matrix = DistanceMatrix {
            dimension: raw.dimension,
            rows: raw.rows,
        };
        matrix.validate()?;
        Ok(matrix)
    }
}

impl DistanceMatrix {
    /// Build a matrix from caller-supplied rows, checking shape and values.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> EnvResult<Self> {
        check_rows(&rows)?;
        Ok(DistanceMatrix {
            dimension: rows.len(),
            rows,
        })
    }

    /// Used by the generator, whose output satisfies the invariants by construction.
    pub(crate) fn from_rows_unchecked(rows: Vec<Vec<f64>>) -> Self {
        DistanceMatrix {
            dimension: rows.len(),
            rows,
        }
    }

    /// Re-check the invariants.
    pub fn validate(&self) -> EnvResult<()> {
        if self.rows.len() != self.dimension {
            return Err(EnvError::invalid_matrix(format!(
                "declared dimension {} but holds {} rows",
                self.dimension,
                self.rows.len()
            )));
        }
        check_rows(&self.rows)
    }

    /// Number of nodes
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Directed weight of the edge `i -> j`
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.rows[i][j]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<f64>> {
        &mut self.rows
    }

    /// Check the triangle inequality `d[i][j] <= d[i][k] + d[k][j]` over all
    /// ordered triples, up to an absolute tolerance.
    pub fn is_metric(&self, tolerance: f64) -> bool {
        self.first_triangle_violation(tolerance).is_none()
    }

    /// First triple `(i, j, k)` breaking the triangle inequality, if any.
    pub fn first_triangle_violation(&self, tolerance: f64) -> Option<(usize, usize, usize)> {
        let n = self.dimension;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    if self.rows[i][j] > self.rows[i][k] + self.rows[k][j] + tolerance {
                        return Some((i, j, k));
                    }
                }
            }
        }
        None
    }

    /// Largest `|d[i][j] - d[j][i]|` over all pairs; 0 for symmetric matrices.
    pub fn max_asymmetry(&self) -> f64 {
        let n = self.dimension;
        let mut worst = 0.0f64;
        for i in 0..n {
            for j in i + 1..n {
                worst = worst.max((self.rows[i][j] - self.rows[j][i]).abs());
            }
        }
        worst
    }

    /// Summary of the off-diagonal weights
    pub fn statistics(&self) -> MatrixStatistics {
        let n = self.dimension;
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut min_distance = f64::INFINITY;
        let mut max_distance = 0.0f64;

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = self.rows[i][j];
                sum += d;
                count += 1;
                min_distance = min_distance.min(d);
                max_distance = max_distance.max(d);
            }
        }

        MatrixStatistics {
            dimension: n,
            avg_distance: if count > 0 { sum / count as f64 } else { 0.0 },
            min_distance: if count > 0 { min_distance } else { 0.0 },
            max_distance,
            max_asymmetry: self.max_asymmetry(),
            metric: self.is_metric(1e-9),
        }
    }
}

fn check_rows(rows: &[Vec<f64>]) -> EnvResult<()> {
    let dimension = rows.len();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != dimension {
            return Err(EnvError::invalid_matrix(format!(
                "row {} has {} entries, expected {}",
                i,
                row.len(),
                dimension
            )));
        }
        for (j, &d) in row.iter().enumerate() {
            if !d.is_finite() || d < 0.0 {
                return Err(EnvError::invalid_matrix(format!(
                    "entry ({}, {}) = {} is not a finite non-negative weight",
                    i, j, d
                )));
            }
        }
        if row[i] != 0.0 {
            return Err(EnvError::invalid_matrix(format!(
                "diagonal entry ({}, {}) is {}, expected 0",
                i, i, row[i]
            )));
        }
    }
    Ok(())
}

impl AsRef<DistanceMatrix> for DistanceMatrix {
    fn as_ref(&self) -> &DistanceMatrix {
        self
    }
}

/// Statistics about a single distance matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixStatistics {
    pub dimension: usize,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub max_asymmetry: f64,
    pub metric: bool,
}

impl std::fmt::Display for MatrixStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Nodes: {}", self.dimension)?;
        writeln!(f, "  Avg distance: {:.4}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.4}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.4}", self.max_distance)?;
        writeln!(f, "  Max asymmetry: {:.4}", self.max_asymmetry)?;
        writeln!(f, "  Triangle inequality: {}", if self.metric { "holds" } else { "violated" })
    }
}
