//! Chunked ingestion into the backend and the dataset store.

use super::LSHIndex;
use crate::error::{Result, RetrieveError};
use crate::hash::VecHash;
use tracing::{debug, info};

impl<H: VecHash> LSHIndex<H> {
    /// Replace the index contents with `vectors`.
    ///
    /// The index is reset to the dimension of `vectors[0]`, then filled in
    /// chunks of `chunk_size`. A persistent backend commits after every chunk
    /// and builds its hash index once at the end.
    ///
    /// Input is validated before anything is touched. A backend failure
    /// mid-way leaves the index desynchronized; call `fit` or `reset` again.
    pub fn fit(&mut self, vectors: &[Vec<f32>], chunk_size: usize) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Err(RetrieveError::InvalidConfiguration(
                "cannot fit an empty set of vectors".to_string(),
            ));
        };
        if chunk_size == 0 {
            return Err(RetrieveError::InvalidConfiguration(
                "chunk_size must be positive".to_string(),
            ));
        }
        let dim = first.len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(RetrieveError::ShapeMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }

        self.reset(dim)?;

        let total = vectors.len();
        let log = self.params.log;
        let backend = self
            .backend
            .as_mut()
            .ok_or(RetrieveError::BackendUnavailable)?;
        backend.preallocate(total);
        self.dataset.reserve(total);
        let persistent = backend.is_persistent();

        let mut stored = 0;
        for (i, chunk) in vectors.chunks(chunk_size).enumerate() {
            backend.store_many(chunk)?;
            if persistent {
                backend.commit()?;
                backend.begin_transaction()?;
            }
            self.dataset.extend_from_chunk(chunk);
            stored += chunk.len();
            if log {
                info!(chunk = i, stored, total, "stored chunk");
            } else {
                debug!(chunk = i, stored, total, "stored chunk");
            }
        }

        if persistent {
            backend.commit()?;
            backend.build_index()?;
            info!(records = stored, "hash index built");
        }
        Ok(())
    }

    /// Append vectors to the current generation, returning their ids.
    pub fn store_vecs(&mut self, vs: &[Vec<f32>]) -> Result<Vec<u32>> {
        for v in vs {
            self.check_dim(v)?;
        }
        self.aligned_backend()?;
        let backend = self
            .backend
            .as_mut()
            .ok_or(RetrieveError::BackendUnavailable)?;
        let persistent = backend.is_persistent();
        if persistent {
            backend.begin_transaction()?;
        }
        let ids = backend.store_many(vs)?;
        if persistent {
            backend.commit()?;
        }
        self.dataset.extend_from_chunk(vs);
        debug!(added = ids.len(), records = self.dataset.len(), "stored vectors");
        Ok(ids)
    }

    /// Append one vector, returning its id.
    pub fn store_vec(&mut self, v: &[f32]) -> Result<u32> {
        self.check_dim(v)?;
        self.aligned_backend()?;
        let backend = self
            .backend
            .as_mut()
            .ok_or(RetrieveError::BackendUnavailable)?;
        let persistent = backend.is_persistent();
        if persistent {
            backend.begin_transaction()?;
        }
        let id = backend.store_one(v)?;
        if persistent {
            backend.commit()?;
        }
        let pushed = self.dataset.push(v);
        debug_assert_eq!(id, pushed);
        Ok(id)
    }
}
