//! Euclidean hashing with p-stable (Gaussian) projections.
//!
//! `h_j(v) = floor((a_j · v + b_j) / r)` with `a_j ~ N(0, I)` and `b_j ~ U[0, r)`.
//! Points closer than the bucket width `r` land in the same slot with high
//! probability.

use super::probe::query_directed;
use super::{create_rng, standard_normal, HashKey, VecHash};
use crate::config::L2Params;
use crate::distance::DistanceMetric;
use crate::error::{Result, RetrieveError};
use crate::simd;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Euclidean LSH family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L2Hasher {
    /// Projection directions, row-major `n_projections x dim`.
    a: Vec<f32>,
    /// Offsets in `[0, r)`.
    b: Vec<f32>,
    r: f32,
    dim: usize,
    n_projections: usize,
}

impl L2Hasher {
    /// Bucket width.
    pub fn r(&self) -> f32 {
        self.r
    }

    /// `a_j · v + b_j` for every projection.
    fn project(&self, v: &[f32]) -> Vec<f32> {
        self.a
            .chunks_exact(self.dim)
            .zip(&self.b)
            .map(|(a_j, b_j)| simd::dot(a_j, v) + b_j)
            .collect()
    }
}

impl VecHash for L2Hasher {
    type Params = L2Params;

    const METRIC: DistanceMetric = DistanceMetric::L2;
    const NAME: &'static str = "l2";

    fn new(n_projections: usize, dim: usize, params: L2Params, seed: u64) -> Self {
        let mut rng = create_rng(seed);
        let a = (0..n_projections * dim)
            .map(|_| standard_normal(&mut rng))
            .collect();
        let b = (0..n_projections)
            .map(|_| rng.random::<f32>() * params.r)
            .collect();
        Self {
            a,
            b,
            r: params.r,
            dim,
            n_projections,
        }
    }

    fn validate_params(params: &L2Params) -> Result<()> {
        if !(params.r.is_finite() && params.r > 0.0) {
            return Err(RetrieveError::InvalidConfiguration(format!(
                "bucket width r must be finite and positive, got {}",
                params.r
            )));
        }
        Ok(())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn n_projections(&self) -> usize {
        self.n_projections
    }

    fn hash_query(&self, v: &[f32]) -> HashKey {
        self.project(v)
            .into_iter()
            .map(|f| (f / self.r).floor() as i32)
            .collect()
    }

    fn probe(&self, v: &[f32], budget: usize) -> Vec<HashKey> {
        let projections = self.project(v);
        let hash: HashKey = projections
            .iter()
            .map(|f| (f / self.r).floor() as i32)
            .collect();
        // Offset of the query inside its slot, in [0, r).
        let lower: Vec<f32> = projections
            .iter()
            .zip(&hash)
            .map(|(f, &h)| f - h as f32 * self.r)
            .collect();
        query_directed(&hash, &lower, self.r, budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> L2Hasher {
        L2Hasher::new(7, 5, L2Params { r: 2.2 }, 1)
    }

    #[test]
    fn close_vectors_share_a_key_distant_ones_do_not() {
        let h = hasher();
        let h1 = h.hash_query(&[1., 2., 3., 1., 3.]);
        let h2 = h.hash_query(&[1.001, 2., 3., 1., 3.001]);
        let h3 = h.hash_query(&[10., 10., 10., 10., 10.1]);
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 7);
    }

    #[test]
    fn same_seed_same_function() {
        assert_eq!(hasher(), hasher());
        assert_ne!(hasher(), L2Hasher::new(7, 5, L2Params { r: 2.2 }, 2));
    }

    #[test]
    fn offsets_lie_inside_the_bucket_width() {
        let h = L2Hasher::new(32, 3, L2Params { r: 0.5 }, 4);
        assert!(h.b.iter().all(|&b| (0.0..0.5).contains(&b)));
    }

    #[test]
    fn probe_starts_with_the_query_key() {
        let h = hasher();
        let v = [0.4, -1.2, 0.0, 2.0, 0.7];
        let probes = h.probe(&v, 6);
        assert_eq!(probes.len(), 7);
        assert_eq!(probes[0], h.hash_query(&v));
        for p in &probes[1..] {
            let moved: i32 = p.iter().zip(&probes[0]).map(|(a, b)| (a - b).abs()).sum();
            assert!(moved >= 1);
            assert!(p.iter().zip(&probes[0]).all(|(a, b)| (a - b).abs() <= 1));
        }
    }

    #[test]
    fn non_positive_width_is_rejected() {
        assert!(L2Hasher::validate_params(&L2Params { r: 0.0 }).is_err());
        assert!(L2Hasher::validate_params(&L2Params { r: f32::NAN }).is_err());
        assert!(L2Hasher::validate_params(&L2Params { r: 4.0 }).is_ok());
    }
}
