//! proxima: approximate nearest-neighbor retrieval with locality-sensitive hashing.
//!
//! Vectors are hashed into buckets so that close vectors tend to collide. A
//! query gathers the vectors sharing its buckets (cheap, noisy candidates),
//! then reranks them by exact distance against the stored vectors.
//!
//! - `hash/`: hash families (Euclidean p-stable, sign random projections) and
//!   multi-probe sequences
//! - `backend/`: bucket storage, in memory or in a SQLite file
//! - `dataset`: the exact vectors used for reranking
//! - `lsh/`: the index: lifecycle, chunked ingestion, retrieval and reranking
//! - `stats`: collision probabilities for choosing parameters
//! - `benchmark/`: synthetic data, ground truth, recall
//!
//! # Critical Nuances
//!
//! ## False negatives are silent
//!
//! A true neighbor that lands in another bucket in every table is simply not
//! returned. Recall is traded against cost through the bucket width `r`, the
//! number of tables `L` and the multi-probe budget; see [`stats`] to pick them.
//!
//! ## Scale matters for Euclidean data
//!
//! Candidates at distance [`ACCEPT_DISTANCE`] (1.0) or more are discarded.
//! Rescale Euclidean data so that true neighbors lie within distance 1
//! (e.g. by [`benchmark::neighbor_radius`]).
//!
//! ## Ids are insertion offsets
//!
//! Record `i` is the `i`-th vector stored since the last reset. `fit` resets;
//! `store_vec`/`store_vecs` append.

pub mod backend;
pub mod benchmark;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod hash;
pub mod lsh;
pub mod simd;
pub mod stats;

// Re-exports
pub use backend::{IndexBackend, ProbeMode};
pub use config::{L2Params, LSHParams, QueryOptions, DEFAULT_CHUNK_SIZE};
pub use distance::DistanceMetric;
pub use error::{Result, RetrieveError};
pub use hash::{L2Hasher, SignRandomProjections, VecHash};
pub use lsh::{CosineIndex, L2Index, LSHIndex, QueryResult, ACCEPT_DISTANCE};
