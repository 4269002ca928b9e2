//! LSH index: backend lifecycle, ingestion and reranked retrieval.
//!
//! [`LSHIndex`] pairs an [`IndexBackend`] (hash functions and buckets) with a
//! [`DatasetStore`] (the exact vectors). Both are created, filled and torn
//! down together so that id `i` in a bucket always names `dataset[i]`.
//!
//! ```text
//! fit ──► reset(dim) ──► store_many per chunk ──► commit/begin ──► build_index
//!                              │
//!                              └──► dataset.extend (same order, same ids)
//!
//! predict ──► bucket ids (all tables, probes) ──► dedupe ──► exact distance
//!         ──► keep d < ACCEPT_DISTANCE ──► sort ──► top_k
//! ```
//!
//! # Example
//!
//! ```
//! use proxima::{L2Index, L2Params, LSHParams, QueryOptions};
//!
//! let params = LSHParams::new(8, 4, 3).seed(7).in_memory(true);
//! let mut index = L2Index::l2(params, L2Params::default())?;
//! index.fit(&[vec![0.1, 0.2, 0.3], vec![5.0, 5.0, 5.0]], 1000)?;
//!
//! let result = index.predict_one(&[0.1, 0.2, 0.3], &QueryOptions::default())?;
//! assert_eq!(result.indices[0], 0);
//! assert_eq!(result.distances[0], 0.0);
//! # Ok::<(), proxima::RetrieveError>(())
//! ```

mod ingest;
mod query;

pub use query::QueryResult;

use crate::backend::{IndexBackend, ProbeMode};
use crate::config::{L2Params, LSHParams};
use crate::dataset::DatasetStore;
use crate::error::{Result, RetrieveError};
use crate::hash::{L2Hasher, SignRandomProjections, VecHash};
use std::collections::HashSet;
use tracing::{info, warn};

/// Candidates at this distance or beyond are discarded.
///
/// Euclidean data is expected to be scaled so that true neighbors lie within
/// distance 1; cosine distance ranges over `[0, 2]`.
pub const ACCEPT_DISTANCE: f32 = 1.0;

/// Euclidean LSH index.
pub type L2Index = LSHIndex<L2Hasher>;

/// Cosine LSH index.
pub type CosineIndex = LSHIndex<SignRandomProjections>;

/// Approximate nearest-neighbor index over one hash family.
#[derive(Debug)]
pub struct LSHIndex<H: VecHash> {
    /// `None` only after a reset failed halfway.
    backend: Option<IndexBackend<H>>,
    dataset: DatasetStore,
    params: LSHParams,
    family: H::Params,
    probe: ProbeMode,
}

impl LSHIndex<L2Hasher> {
    /// Euclidean index with bucket width `l2.r`.
    pub fn l2(params: LSHParams, l2: L2Params) -> Result<Self> {
        Self::new(params, l2)
    }
}

impl LSHIndex<SignRandomProjections> {
    /// Cosine index with sign random projections.
    pub fn cosine(params: LSHParams) -> Result<Self> {
        Self::new(params, ())
    }
}

impl<H: VecHash> LSHIndex<H> {
    pub fn new(params: LSHParams, family: H::Params) -> Result<Self> {
        let backend = IndexBackend::create(&params, family)?;
        Ok(Self {
            backend: Some(backend),
            dataset: DatasetStore::new(params.dim),
            params,
            family,
            probe: ProbeMode::Base,
        })
    }

    fn backend(&self) -> Result<&IndexBackend<H>> {
        self.backend.as_ref().ok_or(RetrieveError::BackendUnavailable)
    }

    fn backend_mut(&mut self) -> Result<&mut IndexBackend<H>> {
        self.backend.as_mut().ok_or(RetrieveError::BackendUnavailable)
    }

    /// The backend, provided its ids line up with the dataset store.
    fn aligned_backend(&self) -> Result<&IndexBackend<H>> {
        let backend = self.backend()?;
        if backend.len() != self.dataset.len() {
            warn!(
                dataset = self.dataset.len(),
                backend = backend.len(),
                "dataset store and index backend are out of step"
            );
            return Err(RetrieveError::Desynchronized {
                dataset: self.dataset.len(),
                backend: backend.len(),
            });
        }
        Ok(backend)
    }

    fn check_dim(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.params.dim {
            return Err(RetrieveError::ShapeMismatch {
                expected: self.params.dim,
                actual: v.len(),
            });
        }
        Ok(())
    }

    /// Drop all records and start over with vectors of length `dim`.
    ///
    /// The old backend is destroyed first (its file deleted, if persistent),
    /// then a fresh one is built from the stored parameters. Probe mode
    /// carries over.
    pub fn reset(&mut self, dim: usize) -> Result<()> {
        let params = self.params.with_dim(dim);
        params.validate()?;

        if let Some(old) = self.backend.take() {
            old.destroy()?;
        }
        self.dataset.clear(dim);
        self.params = params;

        let mut backend = IndexBackend::create(&self.params, self.family)?;
        backend.set_probe_mode(self.probe);
        self.backend = Some(backend);
        info!(
            dim,
            persistent = !self.params.in_memory,
            "index reset"
        );
        Ok(())
    }

    /// Destroy the index and delete its database file.
    pub fn clean(self) -> Result<()> {
        if let Some(backend) = self.backend {
            backend.destroy()?;
        }
        info!(path = %self.params.db_path.display(), "index cleaned");
        Ok(())
    }

    /// Move a persistent backend into memory, copying `pages_per_step` pages
    /// at a time. Queries get faster; later writes no longer reach the file.
    pub fn to_memory(&mut self, pages_per_step: usize) -> Result<()> {
        let backend = self.backend_mut()?;
        let was_persistent = backend.is_persistent();
        backend.to_memory(pages_per_step)?;
        if was_persistent {
            info!(pages_per_step, "backend promoted to memory");
        }
        Ok(())
    }

    /// Probe up to `budget` extra buckets per table on every query.
    pub fn multi_probe(&mut self, budget: usize) {
        self.set_probe_mode(ProbeMode::MultiProbe { budget });
    }

    /// Probe only the query's own bucket.
    pub fn base(&mut self) {
        self.set_probe_mode(ProbeMode::Base);
    }

    fn set_probe_mode(&mut self, mode: ProbeMode) {
        self.probe = mode;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_probe_mode(mode);
        }
    }

    pub fn probe_mode(&self) -> ProbeMode {
        self.probe
    }

    /// Remove every record equal to `v` from the buckets. Returns how many
    /// were removed.
    ///
    /// The dataset store keeps their slots, so other ids do not move.
    pub fn delete_vec(&mut self, v: &[f32]) -> Result<usize> {
        self.check_dim(v)?;
        self.aligned_backend()?;
        let ids: Vec<u32> = self
            .dataset
            .iter()
            .filter(|(_, stored)| *stored == v)
            .map(|(id, _)| id)
            .collect();

        let backend = self.backend.as_mut().ok_or(RetrieveError::BackendUnavailable)?;
        let persistent = backend.is_persistent();
        if persistent {
            backend.begin_transaction()?;
        }
        let mut removed = 0;
        for id in ids {
            if backend.delete_one(v, id)? {
                removed += 1;
            }
        }
        if persistent {
            backend.commit()?;
        }
        Ok(removed)
    }

    /// Stored vectors sharing a bucket with `v`, each once.
    pub fn query_bucket(&self, v: &[f32]) -> Result<Vec<&[f32]>> {
        let backend = self.aligned_backend()?;
        let ids = backend.query_bucket_ids(v)?;
        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.dataset.get(id))
            .collect())
    }

    /// Raw candidate ids for `v`: every table, every probe, duplicates kept.
    pub fn query_bucket_ids(&self, v: &[f32]) -> Result<Vec<u32>> {
        self.backend()?.query_bucket_ids(v)
    }

    pub fn query_bucket_ids_batch(&self, vs: &[Vec<f32>]) -> Result<Vec<Vec<u32>>> {
        self.backend()?.query_bucket_ids_batch(vs)
    }

    /// Backend summary plus dataset size.
    pub fn describe(&self) -> Result<String> {
        let mut out = self.backend()?.describe()?;
        out.push_str(&format!(
            "dataset: {} records ({} bytes)\n",
            self.dataset.len(),
            self.dataset.size_bytes()
        ));
        Ok(out)
    }

    /// Records in the dataset store.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.params.dim
    }

    pub fn params(&self) -> &LSHParams {
        &self.params
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_persistent())
    }
}
