//! Candidate retrieval and exact reranking.

use super::{LSHIndex, ACCEPT_DISTANCE};
use crate::benchmark::mean_collisions;
use crate::config::QueryOptions;
use crate::dataset::DatasetStore;
use crate::distance::DistanceMetric;
use crate::error::{Result, RetrieveError};
use crate::hash::VecHash;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Ranked neighbors of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Record ids, closest first.
    pub indices: Vec<u32>,
    /// The vectors behind `indices`; `None` when only ids were requested.
    pub vectors: Option<Vec<Vec<f32>>>,
    /// Raw candidate count before deduplication and filtering.
    pub n_collisions: usize,
    /// Distances matching `indices`.
    pub distances: Vec<f32>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Turn raw bucket candidates into a ranked result.
///
/// Candidates are deduplicated in first-seen order. With `window`, they are
/// scored `window` at a time and scanning stops after the first window that
/// leaves any accepted neighbor.
pub(crate) fn rerank(
    query: &[f32],
    candidates: &[u32],
    dataset: &DatasetStore,
    metric: DistanceMetric,
    options: &QueryOptions,
    window: Option<usize>,
) -> QueryResult {
    let mut seen = HashSet::with_capacity(candidates.len());
    let unique: Vec<u32> = candidates
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let score = |ids: &[u32], accepted: &mut Vec<(u32, f32)>| {
        for &id in ids {
            let Some(v) = dataset.get(id) else {
                continue;
            };
            let d = metric.distance(query, v);
            // NaN fails the comparison and is dropped.
            if d < ACCEPT_DISTANCE {
                accepted.push((id, d));
            }
        }
    };

    let mut accepted = Vec::new();
    match window {
        Some(w) => {
            for ids in unique.chunks(w.max(1)) {
                score(ids, &mut accepted);
                if !accepted.is_empty() {
                    break;
                }
            }
        }
        None => score(&unique, &mut accepted),
    }

    accepted.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    accepted.truncate(options.top_k);

    let vectors = (!options.only_index).then(|| {
        accepted
            .iter()
            .filter_map(|&(id, _)| dataset.get(id).map(<[f32]>::to_vec))
            .collect()
    });
    let (indices, distances) = accepted.into_iter().unzip();
    QueryResult {
        indices,
        vectors,
        n_collisions: candidates.len(),
        distances,
    }
}

impl<H: VecHash> LSHIndex<H> {
    /// Approximate neighbors of every query, in input order.
    ///
    /// Bucket lookups run one query at a time against the backend; reranking
    /// runs in parallel.
    pub fn predict(&self, queries: &[Vec<f32>], options: &QueryOptions) -> Result<Vec<QueryResult>> {
        self.predict_batch(queries, options)
    }

    /// [`Self::predict`] for a single query.
    pub fn predict_one(&self, query: &[f32], options: &QueryOptions) -> Result<QueryResult> {
        let mut results = self.predict_batch(&[query], options)?;
        // One query in, one result out.
        Ok(results.swap_remove(0))
    }

    fn predict_batch<V>(&self, queries: &[V], options: &QueryOptions) -> Result<Vec<QueryResult>>
    where
        V: AsRef<[f32]> + Sync,
    {
        options.validate()?;
        if self.dataset.is_empty() {
            return Err(RetrieveError::NotFitted);
        }
        let backend = self.aligned_backend()?;
        for q in queries {
            self.check_dim(q.as_ref())?;
        }

        let candidates = backend.query_bucket_ids_batch(queries)?;
        let window = options.bound.map(|b| b * backend.n_hash_tables());
        let dataset = &self.dataset;
        let results: Vec<QueryResult> = queries
            .par_iter()
            .zip(candidates.par_iter())
            .map(|(q, c)| rerank(q.as_ref(), c, dataset, H::METRIC, options, window))
            .collect();

        debug!(
            queries = results.len(),
            mean_collisions = mean_collisions(results.iter().map(|r| r.n_collisions)),
            "predicted batch"
        );
        Ok(results)
    }
}
