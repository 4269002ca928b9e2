//! Benchmark utilities for LSH retrieval.
//!
//! Seeded Gaussian datasets, rescaling to a neighbor radius, brute-force
//! ground truth and recall. Used by the integration tests, the criterion
//! benches and the demo.
//!
//! A typical Euclidean experiment:
//!
//! 1. draw `gaussian_dataset(10_000, 100, 10, seed)`;
//! 2. compute `neighbor_radius(&train, 100, 4)` and `rescale` by it so true
//!   neighbors sit near distance 1;
//! 3. fit an index, predict the test set, compare against
//!   `compute_all_ground_truth` with `mean_recall`.

pub mod datasets;
pub mod metrics;

pub use datasets::{
    compute_all_ground_truth, compute_ground_truth, gaussian_dataset, neighbor_radius, Dataset,
};
pub use metrics::{mean_collisions, mean_recall, recall_at_k};
