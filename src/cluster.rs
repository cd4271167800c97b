use rayon::prelude::*;

use crate::error::HeatplotError;

/// Clustering back-ends usable for re-grouping regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterMethod {
    Kmeans,
    Hierarchical,
}

const KMEANS_MAX_ITER: usize = 300;
const KMEANS_TOLERANCE: f64 = 1e-4;
const KMEANS_SEED: u64 = 42;

struct Xorshift64(u64);

impl Xorshift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_bounded(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn sq_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// K-means with k-means++ initialization and Lloyd iterations. The seed is
/// fixed so repeated runs over the same matrix give the same partition.
pub fn kmeans(data: &[Vec<f64>], k: usize) -> Result<Vec<usize>, HeatplotError> {
    let n = data.len();
    validate(n, k, data)?;
    let dim = data[0].len();

    // k-means++ init
    let mut rng = Xorshift64(KMEANS_SEED);
    let mut centroids = vec![vec![0.0; dim]; k];
    let first = rng.next_bounded(n as u64) as usize;
    centroids[0].copy_from_slice(&data[first]);

    for c in 1..k {
        let dists: Vec<f64> = data
            .iter()
            .map(|p| {
                centroids[..c]
                    .iter()
                    .map(|cent| sq_euclidean(p, cent))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = dists.iter().sum();
        let next = if total == 0.0 {
            rng.next_bounded(n as u64) as usize
        } else {
            let mut target = rng.next_f64() * total;
            let mut chosen = n - 1;
            for (i, d) in dists.iter().enumerate() {
                target -= d;
                if target <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids[c].copy_from_slice(&data[next]);
    }

    // Lloyd iterations
    let mut labels = vec![0usize; n];
    for _ in 0..KMEANS_MAX_ITER {
        labels = data
            .par_iter()
            .map(|p| {
                let mut best = 0;
                let mut best_d = f64::INFINITY;
                for (c, cent) in centroids.iter().enumerate() {
                    let d = sq_euclidean(p, cent);
                    if d < best_d {
                        best_d = d;
                        best = c;
                    }
                }
                best
            })
            .collect();

        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (p, &l) in data.iter().zip(labels.iter()) {
            counts[l] += 1;
            for (s, v) in sums[l].iter_mut().zip(p.iter()) {
                *s += v;
            }
        }

        let mut shift = 0.0;
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            for d in 0..dim {
                let new = sums[c][d] / counts[c] as f64;
                shift += (new - centroids[c][d]).abs();
                centroids[c][d] = new;
            }
        }
        if shift < KMEANS_TOLERANCE {
            break;
        }
    }

    Ok(labels)
}

/// Agglomerative clustering with average linkage (Lance-Williams update),
/// cut at `k` clusters.
pub fn hierarchical(data: &[Vec<f64>], k: usize) -> Result<Vec<usize>, HeatplotError> {
    let n = data.len();
    validate(n, k, data)?;

    // full distance matrix between active clusters
    let mut dist = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = sq_euclidean(&data[i], &data[j]).sqrt();
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut active: Vec<usize> = (0..n).collect();
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    while active.len() > k {
        let mut best = (0usize, 1usize);
        let mut best_d = f64::INFINITY;
        for ai in 0..active.len() {
            for aj in (ai + 1)..active.len() {
                let (i, j) = (active[ai], active[aj]);
                if dist[i][j] < best_d {
                    best_d = dist[i][j];
                    best = (ai, aj);
                }
            }
        }
        let (ai, aj) = best;
        let (i, j) = (active[ai], active[aj]);
        let (ni, nj) = (members[i].len() as f64, members[j].len() as f64);

        // average-linkage distance of the merged cluster to every other one
        for &other in &active {
            if other == i || other == j {
                continue;
            }
            let d = (ni * dist[i][other] + nj * dist[j][other]) / (ni + nj);
            dist[i][other] = d;
            dist[other][i] = d;
        }
        let merged = members[j].clone();
        members[i].extend(merged);
        active.remove(aj);
    }

    let mut labels = vec![0usize; n];
    for (cluster, &rep) in active.iter().enumerate() {
        for &m in &members[rep] {
            labels[m] = cluster;
        }
    }
    Ok(labels)
}

/// Renumber cluster labels so that cluster 0 is the largest. Empty labels
/// are compacted away; the returned count is the number of non-empty
/// clusters.
pub fn relabel_by_size(labels: &mut [usize], k: usize) -> usize {
    let mut counts = vec![0usize; k];
    for &l in labels.iter() {
        counts[l] += 1;
    }
    let mut order: Vec<usize> = (0..k).filter(|&c| counts[c] > 0).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
    let mut remap = vec![0usize; k];
    for (new, &old) in order.iter().enumerate() {
        remap[old] = new;
    }
    for l in labels.iter_mut() {
        *l = remap[*l];
    }
    order.len()
}

fn validate(n: usize, k: usize, data: &[Vec<f64>]) -> Result<(), HeatplotError> {
    if n == 0 {
        return Err(HeatplotError::Config("no regions to cluster".to_string()));
    }
    if k == 0 {
        return Err(HeatplotError::Config(
            "the number of clusters must be > 0".to_string(),
        ));
    }
    if k > n {
        return Err(HeatplotError::Config(format!(
            "requested {} clusters but only {} regions are available",
            k, n
        )));
    }
    let dim = data[0].len();
    if dim == 0 || data.iter().any(|row| row.len() != dim) {
        return Err(HeatplotError::Config(
            "regions must share the same number of bins".to_string(),
        ));
    }
    Ok(())
}
