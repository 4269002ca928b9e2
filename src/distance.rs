//! Distance metrics used for exact reranking.
//!
//! The index supports exactly two notions of distance, each implied by the hash
//! family: Euclidean for [`L2Hasher`](crate::hash::L2Hasher) and cosine for
//! [`SignRandomProjections`](crate::hash::SignRandomProjections).
//!
//! ## Important nuance
//!
//! [`cosine_distance`] is defined as $1 - \cos(a,b)$ and computes norms, so it
//! does **not** require normalized inputs. It lies in `[0, 2]`; anything above
//! [`ACCEPT_DISTANCE`](crate::lsh::ACCEPT_DISTANCE) is treated as dissimilar.

use crate::simd;
use serde::{Deserialize, Serialize};

/// Distance metric for dense vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance.
    L2,
    /// Cosine distance $1 - \cos(a,b)$.
    Cosine,
}

impl DistanceMetric {
    /// Compute distance between two vectors.
    ///
    /// If dimensions mismatch, this returns `f32::INFINITY` (so it is never selected as a
    /// nearest neighbor).
    #[inline]
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => l2_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    /// Short lowercase name, as used in `describe` output.
    pub fn name(self) -> &'static str {
        match self {
            DistanceMetric::L2 => "euclidean",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

/// L2 (Euclidean) distance.
#[inline]
#[must_use]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    simd::l2_distance(a, b)
}

/// Cosine distance $1 - \cos(a,b)$.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    // Zero vectors have no direction: distance 1 under either kernel.
    if simd::norm(a) == 0.0 || simd::norm(b) == 0.0 {
        return 1.0;
    }
    1.0 - simd::cosine(a, b).clamp(-1.0, 1.0)
}

/// Normalize a vector to unit L2 norm.
#[inline]
#[must_use]
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = simd::norm(v);
    if n < 1e-10 {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_is_zero_for_identical() {
        let a = [1.0_f32, 2.0, 3.0];
        let d = cosine_distance(&a, &a);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_of_opposites_is_two() {
        let a = [1.0_f32, -2.0];
        let b = [-1.0_f32, 2.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vectors_are_at_cosine_distance_one() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 2.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0, 2.0], &[0.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[0.0, 0.0]), 1.0);
    }

    #[test]
    fn l2_distance_of_identical_is_exactly_zero() {
        let a = [0.3_f32, -1.7, 2.25];
        assert_eq!(DistanceMetric::L2.distance(&a, &a), 0.0);
    }

    #[test]
    fn mismatched_lengths_are_infinitely_far() {
        assert!(DistanceMetric::L2.distance(&[1.0], &[1.0, 2.0]).is_infinite());
        assert!(DistanceMetric::Cosine.distance(&[1.0], &[1.0, 2.0]).is_infinite());
    }
}
