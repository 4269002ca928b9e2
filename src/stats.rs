//! Parameter advisor: closed-form collision probabilities.
//!
//! These help pick `r`, `K` and `L` before building an index. Distances are
//! in units of the neighbor radius `R`, i.e. data is assumed rescaled so that
//! true neighbors lie within distance 1.
//!
//! # Example
//!
//! ```
//! use proxima::stats::{estimate_hash_tables, l2_collision_probability};
//!
//! let p1 = l2_collision_probability(4.0, 1.0);
//! // Tables needed to miss a neighbor with probability at most 10%.
//! let l = estimate_hash_tables(0.1, p1, 10).unwrap();
//! assert!(l >= 1);
//! ```

use crate::error::{Result, RetrieveError};
use statrs::consts::SQRT_2PI;
use statrs::function::erf::erfc;

/// Standard normal CDF at `-x`.
fn normal_cdf_neg(x: f64) -> f64 {
    0.5 * erfc(x / std::f64::consts::SQRT_2)
}

/// Probability that one L2 hash digit of bucket width `r` collides for two
/// points at distance `c` (Datar et al. 2004):
///
/// ```text
/// p(r, c) = 1 - 2Φ(-r/c) - 2 / (√(2π) r/c) · (1 - exp(-r² / 2c²))
/// ```
///
/// With `c = 1` this is `P1`; with `c` set to the approximation factor it is `P2`.
pub fn l2_collision_probability(r: f64, c: f64) -> f64 {
    let ratio = r / c;
    1.0 - 2.0 * normal_cdf_neg(ratio)
        - 2.0 / (SQRT_2PI * ratio) * (1.0 - (-(r * r) / (2.0 * c * c)).exp())
}

/// Probability that one sign-random-projection bit collides for two vectors
/// with cosine similarity `sim`: `1 - arccos(sim) / π`.
pub fn cosine_collision_probability(sim: f64) -> f64 {
    1.0 - sim.clamp(-1.0, 1.0).acos() / std::f64::consts::PI
}

/// Probability that a neighbor with per-digit collision probability `p1`
/// shares a bucket with the query in at least one of `l` tables of `k` digits.
pub fn detection_probability(p1: f64, k: usize, l: usize) -> f64 {
    1.0 - (1.0 - p1.powi(k as i32)).powi(l as i32)
}

/// Number of tables so that a neighbor is missed with probability at most
/// `delta`: `round(ln δ / ln(1 - p1^k))`, at least 1.
pub fn estimate_hash_tables(delta: f64, p1: f64, k: usize) -> Result<usize> {
    if !(delta > 0.0 && delta < 1.0) {
        return Err(RetrieveError::InvalidConfiguration(format!(
            "delta must lie in (0, 1), got {delta}"
        )));
    }
    if !(p1 > 0.0 && p1 <= 1.0) {
        return Err(RetrieveError::InvalidConfiguration(format!(
            "p1 must lie in (0, 1], got {p1}"
        )));
    }
    if k == 0 {
        return Err(RetrieveError::InvalidConfiguration(
            "k must be positive".to_string(),
        ));
    }
    let miss = 1.0 - p1.powi(k as i32);
    if miss <= 0.0 {
        return Ok(1);
    }
    let l = (delta.ln() / miss.ln()).round();
    Ok((l as usize).max(1))
}
