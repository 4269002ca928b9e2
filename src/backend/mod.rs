//! Index backend: hash functions plus bucket storage.
//!
//! [`IndexBackend`] owns one hasher per table and a [`TableStore`] holding the
//! buckets. It assigns record ids (dense, in insertion order) and answers
//! bucket-membership queries; it never stores the vectors themselves.
//!
//! Two storage flavors share the [`HashTables`] trait:
//!
//! - [`MemoryTables`]: hash maps, transaction operations are no-ops;
//! - `SqlTables` (feature `sqlite`): one SQLite file, explicit transactions,
//!   an index over the hash column, and optional promotion to an in-memory
//!   copy.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryTables;
#[cfg(feature = "sqlite")]
pub use sqlite::SqlTables;

use crate::config::LSHParams;
use crate::error::{Result, RetrieveError};
use crate::hash::{draw_hashers, HashKey, VecHash};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Tables covered by `describe`.
const DESCRIBE_MAX_TABLES: usize = 3;
/// Buckets per table covered by `describe`.
const DESCRIBE_MAX_BUCKETS: usize = 10_000;

/// Which buckets a query looks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProbeMode {
    /// Only the bucket the query hashes to, in every table.
    #[default]
    Base,
    /// The query's bucket plus up to `budget` nearby buckets per table.
    MultiProbe { budget: usize },
}

/// Bucket-size summary of one table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BucketStats {
    pub n_buckets: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: usize,
    pub max: usize,
}

impl BucketStats {
    fn from_sizes(sizes: &[usize]) -> Self {
        if sizes.is_empty() {
            return Self::default();
        }
        let n = sizes.len() as f64;
        let mean = sizes.iter().sum::<usize>() as f64 / n;
        let mean_sq = sizes.iter().map(|&s| (s * s) as f64).sum::<f64>() / n;
        Self {
            n_buckets: sizes.len(),
            mean,
            std_dev: (mean_sq - mean * mean).max(0.0).sqrt(),
            min: sizes.iter().copied().min().unwrap_or(0),
            max: sizes.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Bucket storage: `table -> hash -> ids`.
pub trait HashTables {
    fn put(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<()>;

    /// Remove `id` from one bucket. Returns whether it was there.
    fn remove(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<bool>;

    /// Append the ids of one bucket to `out`, in id order.
    fn bucket(&self, table: usize, hash: &HashKey, out: &mut Vec<u32>) -> Result<()>;

    /// Room for `additional` more records.
    fn reserve(&mut self, additional: usize);

    /// Size summary over at most `limit` buckets of `table`.
    fn stats(&self, table: usize, limit: usize) -> Result<BucketStats>;
}

/// Bucket storage of an [`IndexBackend`].
#[derive(Debug)]
pub enum TableStore {
    Memory(MemoryTables),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlTables),
}

impl HashTables for TableStore {
    fn put(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<()> {
        match self {
            Self::Memory(t) => t.put(table, hash, id),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(t) => t.put(table, hash, id),
        }
    }

    fn remove(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<bool> {
        match self {
            Self::Memory(t) => t.remove(table, hash, id),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(t) => t.remove(table, hash, id),
        }
    }

    fn bucket(&self, table: usize, hash: &HashKey, out: &mut Vec<u32>) -> Result<()> {
        match self {
            Self::Memory(t) => t.bucket(table, hash, out),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(t) => t.bucket(table, hash, out),
        }
    }

    fn reserve(&mut self, additional: usize) {
        match self {
            Self::Memory(t) => t.reserve(additional),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(t) => t.reserve(additional),
        }
    }

    fn stats(&self, table: usize, limit: usize) -> Result<BucketStats> {
        match self {
            Self::Memory(t) => t.stats(table, limit),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(t) => t.stats(table, limit),
        }
    }
}

/// Header written in front of the encoded hashers, checked on reopen.
#[derive(Debug, Serialize, Deserialize)]
struct StoredHeader {
    family: String,
    n_projections: usize,
    n_hash_tables: usize,
    dim: usize,
}

/// Hash functions plus bucket storage for one hash family.
#[derive(Debug)]
pub struct IndexBackend<H: VecHash> {
    hashers: Vec<H>,
    tables: TableStore,
    probe: ProbeMode,
    n_records: usize,
    params: LSHParams,
}

impl<H: VecHash> IndexBackend<H> {
    /// Build a backend for `params`.
    ///
    /// A persistent backend opens `params.db_path`; if the file already holds
    /// hash functions they are restored (and must match `params`) together
    /// with the record counter.
    pub fn create(params: &LSHParams, family: H::Params) -> Result<Self> {
        params.validate()?;
        H::validate_params(&family)?;

        if params.in_memory {
            let hashers = draw_hashers(
                params.n_hash_tables,
                params.n_projections,
                params.dim,
                family,
                params.seed,
            );
            return Ok(Self {
                hashers,
                tables: TableStore::Memory(MemoryTables::new(params.n_hash_tables)),
                probe: ProbeMode::Base,
                n_records: 0,
                params: params.clone(),
            });
        }
        Self::open_persistent(params, family)
    }

    #[cfg(feature = "sqlite")]
    fn open_persistent(params: &LSHParams, family: H::Params) -> Result<Self> {
        let tables = SqlTables::open(&params.db_path, params.n_hash_tables)?;
        let (hashers, n_records) = match tables.load_hashers()? {
            Some(encoded) => {
                let hashers = decode_hashers::<H>(&encoded, params)?;
                let n_records = tables.record_count()?;
                tracing::warn!(
                    path = %params.db_path.display(),
                    n_records,
                    "reopened existing bucket file; hash functions restored from it"
                );
                (hashers, n_records)
            }
            None => {
                let hashers = draw_hashers(
                    params.n_hash_tables,
                    params.n_projections,
                    params.dim,
                    family,
                    params.seed,
                );
                tables.save_hashers(&encode_hashers(&hashers, params)?)?;
                tables.commit()?;
                tables.begin_transaction()?;
                (hashers, 0)
            }
        };
        Ok(Self {
            hashers,
            tables: TableStore::Sqlite(tables),
            probe: ProbeMode::Base,
            n_records,
            params: params.clone(),
        })
    }

    #[cfg(not(feature = "sqlite"))]
    fn open_persistent(_params: &LSHParams, _family: H::Params) -> Result<Self> {
        Err(RetrieveError::InvalidConfiguration(
            "persistent storage requires the `sqlite` feature; set in_memory".to_string(),
        ))
    }

    /// Number of records hashed so far (ids `0..len`).
    pub fn len(&self) -> usize {
        self.n_records
    }

    pub fn is_empty(&self) -> bool {
        self.n_records == 0
    }

    pub fn dim(&self) -> usize {
        self.params.dim
    }

    pub fn n_hash_tables(&self) -> usize {
        self.hashers.len()
    }

    pub fn hashers(&self) -> &[H] {
        &self.hashers
    }

    pub fn params(&self) -> &LSHParams {
        &self.params
    }

    /// Whether buckets are written to a database file with explicit transactions.
    pub fn is_persistent(&self) -> bool {
        match &self.tables {
            TableStore::Memory(_) => false,
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(t) => t.is_on_disk(),
        }
    }

    pub fn probe_mode(&self) -> ProbeMode {
        self.probe
    }

    pub fn set_probe_mode(&mut self, mode: ProbeMode) {
        self.probe = mode;
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

    fn next_id(&self) -> Result<u32> {
        u32::try_from(self.n_records).map_err(|_| {
            RetrieveError::InvalidConfiguration("record ids exhausted the u32 range".to_string())
        })
    }

    /// Hash and store one vector, returning its id.
    pub fn store_one(&mut self, v: &[f32]) -> Result<u32> {
        self.check_dim(v)?;
        let id = self.next_id()?;
        for (table, hasher) in self.hashers.iter().enumerate() {
            self.tables.put(table, &hasher.hash_put(v), id)?;
        }
        self.n_records += 1;
        Ok(id)
    }

    /// Hash and store vectors in order, returning their ids.
    ///
    /// All lengths are checked before anything is written. Hashing runs in
    /// parallel; bucket writes are sequential so ids follow input order.
    pub fn store_many(&mut self, vs: &[Vec<f32>]) -> Result<Vec<u32>> {
        for v in vs {
            self.check_dim(v)?;
        }
        let hashers = &self.hashers;
        let keys: Vec<Vec<HashKey>> = vs
            .par_iter()
            .map(|v| hashers.iter().map(|h| h.hash_put(v)).collect())
            .collect();

        let mut ids = Vec::with_capacity(vs.len());
        for per_table in &keys {
            let id = self.next_id()?;
            for (table, key) in per_table.iter().enumerate() {
                self.tables.put(table, key, id)?;
            }
            self.n_records += 1;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Remove record `id`, stored as `v`, from its bucket in every table.
    pub fn delete_one(&mut self, v: &[f32], id: u32) -> Result<bool> {
        self.check_dim(v)?;
        let mut removed = false;
        for (table, hasher) in self.hashers.iter().enumerate() {
            removed |= self.tables.remove(table, &hasher.hash_put(v), id)?;
        }
        Ok(removed)
    }

    /// Ids sharing a bucket with `v`, concatenated over tables and probes.
    ///
    /// An id appears once per table it collides in; no deduplication.
    pub fn query_bucket_ids(&self, v: &[f32]) -> Result<Vec<u32>> {
        self.check_dim(v)?;
        let mut out = Vec::new();
        for (table, hasher) in self.hashers.iter().enumerate() {
            match self.probe {
                ProbeMode::Base => self.tables.bucket(table, &hasher.hash_query(v), &mut out)?,
                ProbeMode::MultiProbe { budget } => {
                    for key in hasher.probe(v, budget) {
                        self.tables.bucket(table, &key, &mut out)?;
                    }
                }
            }
        }
        Ok(out)
    }

    /// [`Self::query_bucket_ids`] for each vector, in input order.
    pub fn query_bucket_ids_batch<V: AsRef<[f32]>>(&self, vs: &[V]) -> Result<Vec<Vec<u32>>> {
        vs.iter().map(|v| self.query_bucket_ids(v.as_ref())).collect()
    }

    /// Make every write so far durable. No-op for memory storage.
    pub fn commit(&mut self) -> Result<()> {
        match &self.tables {
            TableStore::Memory(_) => Ok(()),
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(t) => {
                t.save_record_count(self.n_records)?;
                t.commit()
            }
        }
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        match &self.tables {
            TableStore::Memory(_) => Ok(()),
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(t) => t.begin_transaction(),
        }
    }

    /// Index the hash columns. Commits first; no-op for memory storage.
    pub fn build_index(&mut self) -> Result<()> {
        match &self.tables {
            TableStore::Memory(_) => Ok(()),
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(t) => {
                t.save_record_count(self.n_records)?;
                t.build_index()
            }
        }
    }

    /// Reserve room for `n` more records.
    pub fn preallocate(&mut self, n: usize) {
        self.tables.reserve(n);
    }

    /// Copy an on-disk database into memory and continue there.
    ///
    /// No-op unless the backend is persistent. The file is left in place.
    pub fn to_memory(&mut self, pages_per_step: usize) -> Result<()> {
        if pages_per_step == 0 {
            return Err(RetrieveError::InvalidConfiguration(
                "pages_per_step must be positive".to_string(),
            ));
        }
        match &mut self.tables {
            TableStore::Memory(_) => Ok(()),
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(t) => {
                if !t.is_on_disk() {
                    return Ok(());
                }
                t.save_record_count(self.n_records)?;
                t.to_memory(pages_per_step)
            }
        }
    }

    /// Human-readable summary: parameters, storage and bucket statistics.
    pub fn describe(&self) -> Result<String> {
        let storage = match &self.tables {
            TableStore::Memory(_) => "memory".to_string(),
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(t) if t.is_on_disk() => {
                format!("sqlite file {}", self.params.db_path.display())
            }
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(_) => "sqlite (in-memory copy)".to_string(),
        };
        let probe = match self.probe {
            ProbeMode::Base => "base".to_string(),
            ProbeMode::MultiProbe { budget } => format!("multi-probe (budget {budget})"),
        };

        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "family: {} ({} distance, n_projections={}, n_hash_tables={}, dim={})",
            H::NAME,
            H::METRIC.name(),
            self.params.n_projections,
            self.hashers.len(),
            self.params.dim
        );
        let _ = writeln!(out, "storage: {storage}");
        let _ = writeln!(out, "records: {}", self.n_records);
        let _ = writeln!(out, "probe mode: {probe}");
        let _ = writeln!(out, "bucket sizes:");
        for table in 0..self.hashers.len().min(DESCRIBE_MAX_TABLES) {
            let s = self.tables.stats(table, DESCRIBE_MAX_BUCKETS)?;
            let _ = writeln!(
                out,
                "  table {table}: buckets={} mean={:.3} std-dev={:.3} min={} max={}",
                s.n_buckets, s.mean, s.std_dev, s.min, s.max
            );
        }
        Ok(out)
    }

    /// Drop the storage and delete the database file, if any.
    pub fn destroy(self) -> Result<()> {
        let path = match &self.tables {
            TableStore::Memory(_) => None,
            #[cfg(feature = "sqlite")]
            TableStore::Sqlite(t) => t.path().map(Path::to_path_buf),
        };
        // Close the connection before removing the file.
        drop(self);
        if let Some(path) = path {
            remove_artifact(&path)?;
            debug!(path = %path.display(), "bucket file removed");
        }
        Ok(())
    }
}

/// Delete a database file and its journal siblings; missing files are fine.
pub(crate) fn remove_artifact(path: &Path) -> Result<()> {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-journal", "-wal", "-shm"] {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        candidates.push(name.into());
    }
    for file in candidates {
        match std::fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
fn encode_hashers<H: VecHash>(hashers: &[H], params: &LSHParams) -> Result<Vec<u8>> {
    let header = StoredHeader {
        family: H::NAME.to_string(),
        n_projections: params.n_projections,
        n_hash_tables: params.n_hash_tables,
        dim: params.dim,
    };
    let mut encoded = postcard::to_stdvec(&header)?;
    encoded.extend(postcard::to_stdvec(hashers)?);
    Ok(encoded)
}

#[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
fn decode_hashers<H: VecHash>(encoded: &[u8], params: &LSHParams) -> Result<Vec<H>> {
    let (header, rest): (StoredHeader, &[u8]) = postcard::take_from_bytes(encoded)?;
    let expected = (
        H::NAME,
        params.n_projections,
        params.n_hash_tables,
        params.dim,
    );
    let found = (
        header.family.as_str(),
        header.n_projections,
        header.n_hash_tables,
        header.dim,
    );
    if expected != found {
        return Err(RetrieveError::InvalidConfiguration(format!(
            "stored hash functions (family, K, L, dim) = {found:?} do not match the parameters {expected:?}; clean the index file first"
        )));
    }
    let hashers: Vec<H> = postcard::from_bytes(rest)?;
    if hashers.len() != params.n_hash_tables {
        return Err(RetrieveError::BackendIo(format!(
            "stored state holds {} hash functions, header says {}",
            hashers.len(),
            params.n_hash_tables
        )));
    }
    Ok(hashers)
}
