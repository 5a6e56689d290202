//! Tour validation and scoring.
//!
//! Scoring convention, kept as-is for parity with published ATSP results:
//! with `tgt[i] = tour[(i - 1) mod N]`, the cost is
//!
//! ```text
//! cost = sum_i d[tour[i]][tgt[i]]
//! ```
//!
//! i.e. every edge of the closed tour is charged in the direction from the
//! later node back to its predecessor, not in travel order. On an asymmetric
//! matrix the two directions differ.

use crate::error::{EnvError, EnvResult};
use crate::instance::DistanceMatrix;
use rayon::prelude::*;

/// Check that `tour` visits each of `0..num_loc` exactly once.
///
/// `instance` only labels the error.
pub fn validate_tour(instance: usize, tour: &[usize], num_loc: usize) -> EnvResult<()> {
    if tour.len() != num_loc {
        return Err(EnvError::invalid_tour(
            instance,
            format!("expected {} actions, got {}", num_loc, tour.len()),
        ));
    }

    let mut counts = vec![0usize; num_loc];
    for &node in tour {
        if node >= num_loc {
            return Err(EnvError::invalid_tour(
                instance,
                format!("node {} is out of range 0..{}", node, num_loc),
            ));
        }
        counts[node] += 1;
    }

    if let Some(node) = counts.iter().position(|&c| c > 1) {
        return Err(EnvError::invalid_tour(
            instance,
            format!("node {} visited {} times", node, counts[node]),
        ));
    }
    if let Some(node) = counts.iter().position(|&c| c == 0) {
        return Err(EnvError::invalid_tour(instance, format!("node {} never visited", node)));
    }
    Ok(())
}

/// Cost of a complete tour on one matrix.
pub fn score(distance: &DistanceMatrix, tour: &[usize]) -> EnvResult<f64> {
    score_instance(0, distance, tour)
}

fn score_instance(instance: usize, distance: &DistanceMatrix, tour: &[usize]) -> EnvResult<f64> {
    let n = distance.dimension();
    validate_tour(instance, tour, n)?;

    let cost = tour
        .iter()
        .enumerate()
        .map(|(i, &src)| {
            let tgt = tour[(i + n - 1) % n];
            distance.distance(src, tgt)
        })
        .sum();
    Ok(cost)
}

/// Cost of every instance of a batch, computed in parallel.
///
/// Fails as a whole if any tour is invalid; the lowest failing instance is
/// reported.
pub fn score_batch<M>(distances: &[M], tours: &[Vec<usize>]) -> EnvResult<Vec<f64>>
where
    M: AsRef<DistanceMatrix> + Sync,
{
    if distances.len() != tours.len() {
        return Err(EnvError::config(format!(
            "got {} tours for a batch of {} instances",
            tours.len(),
            distances.len()
        )));
    }

    let results: Vec<EnvResult<f64>> = distances
        .par_iter()
        .zip(tours.par_iter())
        .enumerate()
        .map(|(instance, (d, tour))| score_instance(instance, d.as_ref(), tour))
        .collect();

    results.into_iter().collect()
}
