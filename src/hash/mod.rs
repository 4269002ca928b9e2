//! Hash families for dense vectors.
//!
//! Locality-sensitive hashing inverts the usual goal of a hash function: similar
//! vectors should **collide**. A hash table keyed by the hash of every stored
//! vector then yields, for a query, a small bucket of candidates instead of the
//! whole dataset.
//!
//! ## Families
//!
//! | Family | Distance | Hash digit |
//! |--------|----------|------------|
//! | [`L2Hasher`] | Euclidean | `floor((a·v + b) / r)` |
//! | [`SignRandomProjections`] | Cosine | `1` if `h·v > 0` else `0` |
//!
//! Each hasher concatenates `K = n_projections` digits into one [`HashKey`].
//! An index keeps `L = n_hash_tables` independent hashers, one per table.
//!
//! ## Collision probability
//!
//! For two points at distance `c` (in units of the neighbor radius) a single L2
//! digit collides with probability `p1(r, c)`; for SRP it is `1 - θ/π`. A full
//! key collides with `p1^K`, and at least one of `L` tables with
//! `1 - (1 - p1^K)^L`. See [`crate::stats`] for the closed forms.
//!
//! ## Multi-probe
//!
//! [`VecHash::probe`] returns the query's own key followed by up to `budget`
//! nearby keys, so one table can be probed several times instead of adding
//! tables (Lv et al. 2007).
//!
//! ## References
//!
//! - Datar, Immorlica, Indyk & Mirrokni (2004). "Locality-sensitive hashing
//!   scheme based on p-stable distributions."
//! - Charikar (2002). "Similarity estimation techniques from rounding algorithms."
//! - Lv, Josephson, Wang, Charikar & Li (2007). "Multi-probe LSH: efficient
//!   indexing for high-dimensional similarity search."

mod l2;
pub mod probe;
mod srp;

pub use l2::L2Hasher;
pub use srp::SignRandomProjections;

use crate::distance::DistanceMetric;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt::Debug;

/// Concatenated hash digits of one vector in one table.
pub type HashKey = SmallVec<[i32; 16]>;

/// A locality-sensitive hash family.
///
/// Implementations must be deterministic given the seed passed to [`VecHash::new`]
/// and serializable, since the persistent backend stores them alongside the buckets.
pub trait VecHash: Serialize + DeserializeOwned + Debug + Send + Sync + Sized {
    /// Family-specific parameters (e.g. bucket width).
    type Params: Copy + Debug + Send + Sync;

    /// Distance used to rerank candidates produced by this family.
    const METRIC: DistanceMetric;

    /// Family name, stored with persisted state and shown by `describe`.
    const NAME: &'static str;

    /// Draw a new hash function.
    fn new(n_projections: usize, dim: usize, params: Self::Params, seed: u64) -> Self;

    /// Reject parameters the family cannot work with.
    fn validate_params(_params: &Self::Params) -> Result<()> {
        Ok(())
    }

    fn dim(&self) -> usize;

    fn n_projections(&self) -> usize;

    /// Hash a query vector.
    fn hash_query(&self, v: &[f32]) -> HashKey;

    /// Hash a vector that is being stored. Symmetric families reuse [`VecHash::hash_query`].
    fn hash_put(&self, v: &[f32]) -> HashKey {
        self.hash_query(v)
    }

    /// The query's own key followed by up to `budget` perturbed keys, closest first.
    fn probe(&self, v: &[f32], budget: usize) -> Vec<HashKey>;
}

/// RNG for hash function generation. `0` draws the seed from OS entropy.
pub(crate) fn create_rng(seed: u64) -> StdRng {
    if seed == 0 {
        StdRng::seed_from_u64(rand::rng().random())
    } else {
        StdRng::seed_from_u64(seed)
    }
}

/// One sample from the standard normal distribution (Box-Muller).
pub(crate) fn standard_normal<R: Rng>(rng: &mut R) -> f32 {
    // 1 - U keeps u1 in (0, 1] so the log is finite.
    let u1: f32 = 1.0 - rng.random::<f32>();
    let u2: f32 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

/// Draw `n_hash_tables` independent hashers from one master seed.
pub(crate) fn draw_hashers<H: VecHash>(
    n_hash_tables: usize,
    n_projections: usize,
    dim: usize,
    params: H::Params,
    seed: u64,
) -> Vec<H> {
    let mut rng = create_rng(seed);
    (0..n_hash_tables)
        .map(|_| {
            // A zero table seed would fall back to entropy.
            let table_seed = rng.random::<u64>().max(1);
            H::new(n_projections, dim, params, table_seed)
        })
        .collect()
}
