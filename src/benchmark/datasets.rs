//! Synthetic datasets and brute-force ground truth.

use crate::distance::DistanceMetric;
use crate::hash::standard_normal;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A dataset for retrieval experiments.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Vectors to index.
    pub train: Vec<Vec<f32>>,
    /// Query vectors.
    pub test: Vec<Vec<f32>>,
    pub dimension: usize,
}

impl Dataset {
    pub fn n_train(&self) -> usize {
        self.train.len()
    }

    pub fn n_test(&self) -> usize {
        self.test.len()
    }

    /// Divide every train and test vector by `factor`.
    pub fn rescale(&mut self, factor: f32) {
        for v in self.train.iter_mut().chain(self.test.iter_mut()) {
            for x in v.iter_mut() {
                *x /= factor;
            }
        }
    }

    /// Total memory footprint of raw vectors in bytes.
    pub fn memory_bytes(&self) -> usize {
        (self.train.len() + self.test.len()) * self.dimension * std::mem::size_of::<f32>()
    }
}

/// Standard-normal train and test vectors.
pub fn gaussian_dataset(n_train: usize, n_test: usize, dimension: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sample = |n: usize| -> Vec<Vec<f32>> {
        (0..n)
            .map(|_| (0..dimension).map(|_| standard_normal(&mut rng)).collect())
            .collect()
    };
    let train = sample(n_train);
    let test = sample(n_test);
    Dataset {
        train,
        test,
        dimension,
    }
}

/// Mean Euclidean distance from each of the first `n_probe` train vectors to
/// its `k` nearest other train vectors.
///
/// Dividing a dataset by this radius puts typical neighbors at distance ~1,
/// which is the scale the acceptance threshold assumes.
pub fn neighbor_radius(train: &[Vec<f32>], n_probe: usize, k: usize) -> f32 {
    let n_probe = n_probe.min(train.len());
    let mut total = 0.0f64;
    let mut count = 0usize;
    for i in 0..n_probe {
        let mut dists: Vec<f32> = train
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, v)| DistanceMetric::L2.distance(&train[i], v))
            .collect();
        dists.sort_by(|a, b| a.total_cmp(b));
        for d in dists.into_iter().take(k) {
            total += f64::from(d);
            count += 1;
        }
    }
    if count == 0 {
        return 1.0;
    }
    (total / count as f64) as f32
}

/// Exact `k` nearest neighbors of `query` by brute force, closest first.
pub fn compute_ground_truth(
    query: &[f32],
    database: &[Vec<f32>],
    k: usize,
    metric: DistanceMetric,
) -> Vec<u32> {
    let mut distances: Vec<(u32, f32)> = database
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u32, metric.distance(query, v)))
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.into_iter().take(k).map(|(id, _)| id).collect()
}

/// Ground truth for every test query.
pub fn compute_all_ground_truth(
    dataset: &Dataset,
    k: usize,
    metric: DistanceMetric,
) -> Vec<Vec<u32>> {
    dataset
        .test
        .iter()
        .map(|query| compute_ground_truth(query, &dataset.train, k, metric))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_dataset() {
        let dataset = gaussian_dataset(100, 10, 8, 42);
        assert_eq!(dataset.n_train(), 100);
        assert_eq!(dataset.n_test(), 10);
        assert_eq!(dataset.train[0].len(), 8);
        assert_eq!(dataset.memory_bytes(), 110 * 8 * 4);

        let again = gaussian_dataset(100, 10, 8, 42);
        assert_eq!(dataset.train, again.train);
    }

    #[test]
    fn test_rescale_to_unit_radius() {
        let mut dataset = gaussian_dataset(500, 5, 4, 7);
        let radius = neighbor_radius(&dataset.train, 50, 4);
        assert!(radius > 0.0);
        dataset.rescale(radius);
        let rescaled = neighbor_radius(&dataset.train, 50, 4);
        assert!((rescaled - 1.0).abs() < 1e-3, "{rescaled}");
    }

    #[test]
    fn test_compute_ground_truth() {
        let database = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
        ];
        let gt = compute_ground_truth(&[0.1, 0.1], &database, 2, DistanceMetric::L2);
        assert_eq!(gt[0], 0);
        // [1,0] and [0,1] tie; lower id wins.
        assert_eq!(gt[1], 1);
    }
}
