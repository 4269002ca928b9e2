//! SQLite bucket storage.
//!
//! Layout of the database file:
//!
//! ```text
//! hash_table_{i} (hash BLOB, id INTEGER)     one row per (record, table)
//! state          (key TEXT PRIMARY KEY, value BLOB)
//! ```
//!
//! `hash` is the key's digits as little-endian `i32`s. `state` holds the
//! encoded hash functions under `hashers` and the record counter under
//! `n_records`, so a file can be reopened by a later process.
//!
//! Writes are grouped in explicit transactions; the connection opens with
//! one already running. Journaling and fsync are turned off: the file is a
//! rebuildable artifact, not a system of record.

use super::{BucketStats, HashTables};
use crate::error::Result;
use crate::hash::HashKey;
use rusqlite::backup::Backup;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const HASHERS_KEY: &str = "hashers";
const RECORDS_KEY: &str = "n_records";

fn table_name(table: usize) -> String {
    format!("hash_table_{table}")
}

fn encode_hash(hash: &HashKey) -> Vec<u8> {
    hash.iter().flat_map(|d| d.to_le_bytes()).collect()
}

/// Bucket tables in a SQLite database, on disk or promoted to memory.
#[derive(Debug)]
pub struct SqlTables {
    conn: Connection,
    n_hash_tables: usize,
    /// Database file, if any. Kept after promotion so the file can still be removed.
    path: Option<PathBuf>,
    on_disk: bool,
}

impl SqlTables {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, n_hash_tables: usize) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "OFF", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        conn.pragma_update(None, "cache_size", 100_000)?;
        Self::init(conn, n_hash_tables, Some(path.to_path_buf()), true)
    }

    /// A database that lives only in this connection.
    pub fn open_in_memory(n_hash_tables: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, n_hash_tables, None, false)
    }

    fn init(
        conn: Connection,
        n_hash_tables: usize,
        path: Option<PathBuf>,
        on_disk: bool,
    ) -> Result<Self> {
        for table in 0..n_hash_tables {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (hash BLOB, id INTEGER);",
                table_name(table)
            ))?;
        }
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS state (key TEXT PRIMARY KEY, value BLOB);",
        )?;
        let tables = Self {
            conn,
            n_hash_tables,
            path,
            on_disk,
        };
        tables.begin_transaction()?;
        Ok(tables)
    }

    /// Whether writes still reach the database file.
    pub fn is_on_disk(&self) -> bool {
        self.on_disk
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn begin_transaction(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN TRANSACTION;")?;
        }
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT TRANSACTION;")?;
        }
        Ok(())
    }

    /// Index the hash column of every table. Leaves no transaction open.
    pub fn build_index(&self) -> Result<()> {
        self.commit()?;
        for table in 0..self.n_hash_tables {
            let name = table_name(table);
            self.conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS hash_index_{table} ON {name} (hash);"
            ))?;
        }
        Ok(())
    }

    /// Copy the database into an in-memory one, `pages_per_step` pages at a
    /// time, and continue on the copy.
    pub fn to_memory(&mut self, pages_per_step: usize) -> Result<()> {
        self.commit()?;
        let mut mem = Connection::open_in_memory()?;
        {
            let backup = Backup::new(&self.conn, &mut mem)?;
            let step = i32::try_from(pages_per_step).unwrap_or(i32::MAX);
            backup.run_to_completion(step, Duration::ZERO, None)?;
        }
        debug!(pages_per_step, "sqlite database copied to memory");
        self.conn = mem;
        self.on_disk = false;
        Ok(())
    }

    pub fn save_hashers(&self, encoded: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO state (key, value) VALUES (?1, ?2)",
            params![HASHERS_KEY, encoded],
        )?;
        Ok(())
    }

    pub fn load_hashers(&self) -> Result<Option<Vec<u8>>> {
        let encoded = self
            .conn
            .query_row(
                "SELECT value FROM state WHERE key = ?1",
                params![HASHERS_KEY],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(encoded)
    }

    pub fn save_record_count(&self, n_records: usize) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO state (key, value) VALUES (?1, ?2)",
            params![RECORDS_KEY, n_records as i64],
        )?;
        Ok(())
    }

    /// Records known to the file: the saved counter, or one past the largest
    /// stored id when rows were written after the last save.
    pub fn record_count(&self) -> Result<usize> {
        let saved: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM state WHERE key = ?1",
                params![RECORDS_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let mut count = saved.unwrap_or(0);
        if self.n_hash_tables > 0 {
            let next_id: i64 = self.conn.query_row(
                &format!("SELECT COALESCE(MAX(id) + 1, 0) FROM {}", table_name(0)),
                [],
                |row| row.get(0),
            )?;
            count = count.max(next_id);
        }
        Ok(count.max(0) as usize)
    }
}

impl HashTables for SqlTables {
    fn put(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT INTO {} (hash, id) VALUES (?1, ?2)",
            table_name(table)
        ))?;
        stmt.execute(params![encode_hash(hash), id])?;
        Ok(())
    }

    fn remove(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "DELETE FROM {} WHERE hash = ?1 AND id = ?2",
            table_name(table)
        ))?;
        let changed = stmt.execute(params![encode_hash(hash), id])?;
        Ok(changed > 0)
    }

    fn bucket(&self, table: usize, hash: &HashKey, out: &mut Vec<u32>) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT id FROM {} WHERE hash = ?1 ORDER BY id",
            table_name(table)
        ))?;
        let mut rows = stmt.query(params![encode_hash(hash)])?;
        while let Some(row) = rows.next()? {
            out.push(row.get(0)?);
        }
        Ok(())
    }

    fn reserve(&mut self, _additional: usize) {}

    fn stats(&self, table: usize, limit: usize) -> Result<BucketStats> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT count(*), avg(c), avg(c * c) - avg(c) * avg(c), min(c), max(c)
             FROM (SELECT count(id) AS c FROM {} GROUP BY hash LIMIT ?1)",
            table_name(table)
        ))?;
        let stats = stmt.query_row(params![limit], |row| {
            let n_buckets: i64 = row.get(0)?;
            let mean: Option<f64> = row.get(1)?;
            let variance: Option<f64> = row.get(2)?;
            let min: Option<i64> = row.get(3)?;
            let max: Option<i64> = row.get(4)?;
            Ok(BucketStats {
                n_buckets: n_buckets as usize,
                mean: mean.unwrap_or(0.0),
                std_dev: variance.unwrap_or(0.0).max(0.0).sqrt(),
                min: min.unwrap_or(0) as usize,
                max: max.unwrap_or(0) as usize,
            })
        })?;
        Ok(stats)
    }
}
