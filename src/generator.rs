//! Generation of metric-closed ATSP instances.
//!
//! Raw weights are drawn uniformly from `[min_dist, max_dist)`, the diagonal
//! is zeroed, and the matrix is then tightened until the triangle inequality
//! holds for every ordered triple (following the TMAT construction of MatNet,
//! Kwon et al. 2021).
//!
//! Each relaxation pass computes `d'[i][j] = min_k d[i][k] + d[k][j]` over the
//! whole matrix from the previous pass. A pass doubles the path length it can
//! account for, so the loop reaches a fixpoint after at most
//! `ceil(log2(n)) + 1` passes. The loop stops on the fixpoint, not on that
//! bound.

use crate::config::{validate_batch_size, validate_bounds};
use crate::error::EnvResult;
use crate::instance::DistanceMatrix;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Batch generator for random metric ATSP instances
#[derive(Debug, Clone)]
pub struct MetricGenerator {
    num_loc: usize,
    min_dist: f64,
    max_dist: f64,
}

impl MetricGenerator {
    pub fn new(num_loc: usize, min_dist: f64, max_dist: f64) -> EnvResult<Self> {
        validate_bounds(num_loc, min_dist, max_dist)?;
        Ok(MetricGenerator {
            num_loc,
            min_dist,
            max_dist,
        })
    }

    pub fn num_loc(&self) -> usize {
        self.num_loc
    }

    /// Draw `batch_size` raw matrices without applying the closure.
    ///
    /// Draws are consumed batch-major then row-major, diagonal included (and
    /// then overwritten), so a given seed always yields the same matrices.
    pub fn sample_raw<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> EnvResult<Vec<DistanceMatrix>> {
        validate_batch_size(batch_size)?;
        let n = self.num_loc;
        let span = self.max_dist - self.min_dist;

        let matrices = (0..batch_size)
            .map(|_| {
                let mut rows = vec![vec![0.0; n]; n];
                for (i, row) in rows.iter_mut().enumerate() {
                    for (j, entry) in row.iter_mut().enumerate() {
                        let draw = rng.gen::<f64>() * span + self.min_dist;
                        *entry = if i == j { 0.0 } else { draw };
                    }
                }
                DistanceMatrix::from_rows_unchecked(rows)
            })
            .collect();

        Ok(matrices)
    }

    /// Draw `batch_size` matrices and close each one under the triangle inequality.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> EnvResult<Vec<DistanceMatrix>> {
        let mut matrices = self.sample_raw(batch_size, rng)?;

        let passes: Vec<usize> = matrices.par_iter_mut().map(metric_closure).collect();
        log::debug!(
            "generated {} ATSP instances (n={}), closure passes max={}",
            batch_size,
            self.num_loc,
            passes.iter().copied().max().unwrap_or(0)
        );

        Ok(matrices)
    }
}

/// Seeded entry point: `generate(batch_size, num_loc, min_dist, max_dist, seed)`.
pub fn generate(
    batch_size: usize,
    num_loc: usize,
    min_dist: f64,
    max_dist: f64,
    seed: u64,
) -> EnvResult<Vec<DistanceMatrix>> {
    let generator = MetricGenerator::new(num_loc, min_dist, max_dist)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generator.generate(batch_size, &mut rng)
}

/// Tighten `matrix` in place until no relaxation pass changes it.
///
/// Returns the number of passes run, the final no-change pass included.
pub fn metric_closure(matrix: &mut DistanceMatrix) -> usize {
    let mut passes = 0;
    loop {
        passes += 1;
        let relaxed = relax_pass(matrix.rows());
        if relaxed.as_slice() == matrix.rows() {
            break;
        }
        *matrix.rows_mut() = relaxed;
    }
    log::trace!("metric closure of n={} converged after {} passes", matrix.dimension(), passes);
    passes
}

/// One Jacobi-style pass: every entry reads only the previous matrix.
/// `k == i` contributes `0 + d[i][j]`, so entries never increase.
fn relax_pass(d: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = d.len();
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    (0..n)
                        .map(|k| d[i][k] + d[k][j])
                        .fold(f64::INFINITY, f64::min)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_matrices_are_metric() {
        let matrices = generate(8, 20, 0.0, 1.0, 7).unwrap();
        assert_eq!(matrices.len(), 8);
        for m in &matrices {
            assert_eq!(m.dimension(), 20);
            for i in 0..20 {
                assert_eq!(m.distance(i, i), 0.0);
            }
            assert_eq!(m.first_triangle_violation(0.0), None);
        }
    }

    #[test]
    fn test_closure_never_increases_entries() {
        let generator = MetricGenerator::new(15, 0.0, 1.0).unwrap();
        let raw = generator
            .sample_raw(4, &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();
        let closed = generator
            .generate(4, &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();

        for (before, after) in raw.iter().zip(closed.iter()) {
            for i in 0..15 {
                for j in 0..15 {
                    assert!(after.distance(i, j) <= before.distance(i, j));
                    assert!(after.distance(i, j) >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_raw_draws_respect_bounds() {
        let generator = MetricGenerator::new(6, 2.0, 3.0).unwrap();
        let raw = generator
            .sample_raw(3, &mut ChaCha8Rng::seed_from_u64(5))
            .unwrap();
        for m in &raw {
            for i in 0..6 {
                for j in 0..6 {
                    let d = m.distance(i, j);
                    if i == j {
                        assert_eq!(d, 0.0);
                    } else {
                        assert!((2.0..=3.0).contains(&d));
                    }
                }
            }
        }
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let a = generate(32, 5, 0.0, 1.0, 1234).unwrap();
        let b = generate(32, 5, 0.0, 1.0, 1234).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            for (rx, ry) in x.rows().iter().zip(y.rows().iter()) {
                for (vx, vy) in rx.iter().zip(ry.iter()) {
                    assert_eq!(vx.to_bits(), vy.to_bits());
                }
            }
        }

        let c = generate(32, 5, 0.0, 1.0, 1235).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_closure_fixes_scenario_matrix() {
        let mut m = DistanceMatrix::from_rows(vec![
            vec![0.0, 2.0, 9.0],
            vec![1.0, 0.0, 3.0],
            vec![4.0, 5.0, 0.0],
        ])
        .unwrap();
        let passes = metric_closure(&mut m);
        assert_eq!(passes, 2);
        assert_eq!(m.distance(0, 2), 5.0);
        assert_eq!(m.distance(2, 0), 4.0);
        assert!(m.is_metric(0.0));
    }

    #[test]
    fn test_closure_needs_several_passes_on_a_chain() {
        // Cheap edges only along 0 -> 1 -> ... -> 7; everything else is expensive.
        let n = 8;
        let mut rows = vec![vec![100.0; n]; n];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 0.0;
            if i + 1 < n {
                row[i + 1] = 1.0;
            }
        }
        let mut m = DistanceMatrix::from_rows(rows).unwrap();
        let passes = metric_closure(&mut m);

        // Reach 1 -> 2 -> 4 -> 8 hops, plus one pass confirming the fixpoint.
        assert_eq!(passes, 4);
        assert!(passes <= 3 + 1 + 1);
        assert_eq!(m.distance(0, 7), 7.0);
        assert_eq!(m.distance(7, 0), 100.0);
        assert!(m.is_metric(0.0));
    }

    #[test]
    fn test_trivial_sizes() {
        let one = generate(2, 1, 0.0, 1.0, 0).unwrap();
        assert_eq!(one[0].rows(), &[vec![0.0]]);
        assert!(generate(2, 0, 0.0, 1.0, 0).is_err());
        assert!(generate(0, 4, 0.0, 1.0, 0).is_err());
        assert!(generate(2, 4, 1.0, 0.0, 0).is_err());
    }
}
