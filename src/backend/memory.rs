//! Hash-map bucket storage.

use super::{BucketStats, HashTables};
use crate::error::Result;
use crate::hash::HashKey;
use std::collections::HashMap;

/// One `HashKey -> ids` map per table. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTables {
    tables: Vec<HashMap<HashKey, Vec<u32>>>,
}

impl MemoryTables {
    pub fn new(n_hash_tables: usize) -> Self {
        Self {
            tables: (0..n_hash_tables).map(|_| HashMap::new()).collect(),
        }
    }
}

impl HashTables for MemoryTables {
    fn put(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<()> {
        self.tables[table].entry(hash.clone()).or_default().push(id);
        Ok(())
    }

    fn remove(&mut self, table: usize, hash: &HashKey, id: u32) -> Result<bool> {
        let map = &mut self.tables[table];
        let Some(bucket) = map.get_mut(hash) else {
            return Ok(false);
        };
        let before = bucket.len();
        bucket.retain(|&x| x != id);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            map.remove(hash);
        }
        Ok(removed)
    }

    fn bucket(&self, table: usize, hash: &HashKey, out: &mut Vec<u32>) -> Result<()> {
        if let Some(ids) = self.tables[table].get(hash) {
            out.extend_from_slice(ids);
        }
        Ok(())
    }

    fn reserve(&mut self, additional: usize) {
        // Upper bound: every record in its own bucket.
        for map in &mut self.tables {
            map.reserve(additional);
        }
    }

    fn stats(&self, table: usize, limit: usize) -> Result<BucketStats> {
        let sizes: Vec<usize> = self.tables[table]
            .values()
            .take(limit)
            .map(Vec::len)
            .collect();
        Ok(BucketStats::from_sizes(&sizes))
    }
}
