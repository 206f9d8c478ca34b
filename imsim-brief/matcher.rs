//! Brute-force Hamming matching with mutual-nearest-neighbour (cross-check)
//! filtering.

use imsim_core::{DMatch, Descriptor};
use rayon::prelude::*;
use tracing::debug;

/// Number of differing bits between two descriptors
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Nearest `train` descriptor for every `query` descriptor as
/// `(train_idx, distance)`; ties resolve to the lowest index.
/// `None` only when `train` is empty.
pub fn nearest_neighbours(query: &[Descriptor], train: &[Descriptor]) -> Vec<Option<(usize, u32)>> {
    query
        .par_iter()
        .map(|q| {
            train
                .iter()
                .enumerate()
                .map(|(j, t)| (j, hamming_distance(q, t)))
                .min_by_key(|&(j, d)| (d, j))
        })
        .collect()
}

/// Keep `(i, j)` only when `j` is the nearest neighbour of `i` and `i` is the
/// nearest neighbour of `j`. Output follows query order.
pub fn match_cross_check(query: &[Descriptor], train: &[Descriptor]) -> Vec<DMatch> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let (forward, backward) = rayon::join(
        || nearest_neighbours(query, train),
        || nearest_neighbours(train, query),
    );

    let matches: Vec<DMatch> = forward
        .into_iter()
        .enumerate()
        .filter_map(|(query_idx, nn)| {
            let (train_idx, distance) = nn?;
            match backward[train_idx] {
                Some((back, _)) if back == query_idx => Some(DMatch {
                    query_idx,
                    train_idx,
                    distance,
                }),
                _ => None,
            }
        })
        .collect();

    debug!(
        query = query.len(),
        train = train.len(),
        matches = matches.len(),
        "cross-check matching finished"
    );

    matches
}
