//! Exact vectors backing the reranking stage.
//!
//! Vectors live in one flat arena (structure-of-arrays layout); a record's id is
//! its offset in insertion order. The index backend only ever sees the same ids,
//! so the two stay aligned as long as both are appended in the same order.

/// Append-only arena of fixed-dimension vectors.
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    dim: usize,
    data: Vec<f32>,
}

impl DatasetStore {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Vector dimension of this generation.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reserve room for `additional` more records.
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional * self.dim);
    }

    /// Append one vector, returning its id.
    ///
    /// Callers validate the length; a mismatched vector would shift every later id.
    pub(crate) fn push(&mut self, v: &[f32]) -> u32 {
        debug_assert_eq!(v.len(), self.dim);
        let id = self.len() as u32;
        self.data.extend_from_slice(v);
        id
    }

    /// Append a chunk in order.
    pub(crate) fn extend_from_chunk(&mut self, chunk: &[Vec<f32>]) {
        for v in chunk {
            self.push(v);
        }
    }

    /// Vector stored under `id`.
    pub fn get(&self, id: u32) -> Option<&[f32]> {
        let start = (id as usize).checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Iterate `(id, vector)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[f32])> + '_ {
        self.data
            .chunks_exact(self.dim.max(1))
            .enumerate()
            .map(|(i, v)| (i as u32, v))
    }

    /// Drop every record and start a new generation with `dim`.
    pub(crate) fn clear(&mut self, dim: usize) {
        self.data.clear();
        self.dim = dim;
    }

    /// Approximate heap size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<f32>()
    }
}
