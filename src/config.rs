//! Index construction and query parameters.

use crate::error::{Result, RetrieveError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of vectors stored per transaction during ingestion.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Default location of the SQLite bucket file.
pub const DEFAULT_DB_PATH: &str = "./lsh.db3";

/// Parameters shared by every hash family.
///
/// `n_projections` is `K` in the literature (hash digits per table),
/// `n_hash_tables` is `L`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LSHParams {
    /// Hash digits per table (`K`).
    pub n_projections: usize,
    /// Number of hash tables (`L`).
    pub n_hash_tables: usize,
    /// Vector dimension. Replaced by the data's dimension on `fit`.
    pub dim: usize,
    /// Seed for the hash functions. `0` draws the seed from OS entropy.
    pub seed: u64,
    /// Location of the bucket file for the persistent backend.
    pub db_path: PathBuf,
    /// Keep buckets in memory instead of a SQLite file.
    pub in_memory: bool,
    /// Report ingestion progress at `info` level instead of `debug`.
    pub log: bool,
}

impl Default for LSHParams {
    fn default() -> Self {
        Self {
            n_projections: 10,
            n_hash_tables: 1,
            dim: 1,
            seed: 0,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            in_memory: false,
            log: false,
        }
    }
}

impl LSHParams {
    pub fn new(n_projections: usize, n_hash_tables: usize, dim: usize) -> Self {
        Self {
            n_projections,
            n_hash_tables,
            dim,
            ..Self::default()
        }
    }

    /// Set the seed. Reproducible hash functions require a non-zero seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn db_path(mut self, path: impl AsRef<Path>) -> Self {
        self.db_path = path.as_ref().to_path_buf();
        self
    }

    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// Copy of these parameters with another dimension.
    pub(crate) fn with_dim(&self, dim: usize) -> Self {
        Self {
            dim,
            ..self.clone()
        }
    }

    /// Check the structural parameters.
    pub fn validate(&self) -> Result<()> {
        if self.n_projections == 0 {
            return Err(RetrieveError::InvalidConfiguration(
                "n_projections must be positive".to_string(),
            ));
        }
        if self.n_hash_tables == 0 {
            return Err(RetrieveError::InvalidConfiguration(
                "n_hash_tables must be positive".to_string(),
            ));
        }
        if self.dim == 0 {
            return Err(RetrieveError::InvalidConfiguration(
                "dim must be positive".to_string(),
            ));
        }
        if !self.in_memory && !cfg!(feature = "sqlite") {
            return Err(RetrieveError::InvalidConfiguration(
                "persistent storage requires the `sqlite` feature; set in_memory".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the Euclidean hash family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct L2Params {
    /// Bucket width. Wider buckets raise recall and candidate counts.
    pub r: f32,
}

impl Default for L2Params {
    fn default() -> Self {
        Self { r: 4.0 }
    }
}

/// Options for `predict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Return ids and distances only, no vectors.
    pub only_index: bool,
    /// Maximum results per query.
    pub top_k: usize,
    /// Scan distinct candidates (duplicates across tables removed, first
    /// occurrence kept) in windows of `bound * n_hash_tables` and stop at the
    /// first window that yields an accepted neighbor. `None` scans all.
    pub bound: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            only_index: false,
            top_k: 5,
            bound: None,
        }
    }
}

impl QueryOptions {
    pub fn only_index(mut self, only_index: bool) -> Self {
        self.only_index = only_index;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn bound(mut self, bound: usize) -> Self {
        self.bound = Some(bound);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.bound == Some(0) {
            return Err(RetrieveError::InvalidConfiguration(
                "bound must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
