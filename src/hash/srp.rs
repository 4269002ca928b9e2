//! Sign random projections for cosine similarity.
//!
//! Each digit records on which side of a random hyperplane the vector lies:
//!
//! ```text
//! P[sign(h·a) = sign(h·b)] = 1 - θ(a,b)/π
//! ```
//!
//! so vectors at a small angle agree on most digits.

use super::probe::step_wise_flips;
use super::{create_rng, standard_normal, HashKey, VecHash};
use crate::distance::DistanceMetric;
use crate::simd;
use serde::{Deserialize, Serialize};

/// Cosine LSH family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignRandomProjections {
    /// Hyperplane normals, row-major `n_projections x dim`.
    hyperplanes: Vec<f32>,
    dim: usize,
    n_projections: usize,
}

impl VecHash for SignRandomProjections {
    type Params = ();

    const METRIC: DistanceMetric = DistanceMetric::Cosine;
    const NAME: &'static str = "srp";

    fn new(n_projections: usize, dim: usize, _params: (), seed: u64) -> Self {
        let mut rng = create_rng(seed);
        let hyperplanes = (0..n_projections * dim)
            .map(|_| standard_normal(&mut rng))
            .collect();
        Self {
            hyperplanes,
            dim,
            n_projections,
        }
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn n_projections(&self) -> usize {
        self.n_projections
    }

    fn hash_query(&self, v: &[f32]) -> HashKey {
        self.hyperplanes
            .chunks_exact(self.dim)
            .map(|h| i32::from(simd::dot(h, v) > 0.0))
            .collect()
    }

    fn probe(&self, v: &[f32], budget: usize) -> Vec<HashKey> {
        step_wise_flips(&self.hash_query(v), budget)
    }
}
