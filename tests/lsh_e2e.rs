//! End-to-end retrieval tests for proxima.
//!
//! Build an index from seeded Gaussian data, query it, and check the
//! structural guarantees of the results.

use proxima::benchmark::{compute_all_ground_truth, gaussian_dataset, mean_recall, neighbor_radius};
use proxima::{
    CosineIndex, DistanceMetric, L2Index, L2Params, LSHParams, ProbeMode, QueryOptions,
    QueryResult, ACCEPT_DISTANCE,
};
use std::collections::HashSet;

const N: usize = 10_000;
const N_QUERIES: usize = 100;
const DIM: usize = 10;

fn check_structure(results: &[QueryResult], top_k: usize) {
    for r in results {
        assert!(r.len() <= top_k);
        assert_eq!(r.indices.len(), r.distances.len());
        assert!(r.n_collisions >= r.len());
        assert!(r.distances.iter().all(|&d| d < ACCEPT_DISTANCE));
        assert!(r.distances.windows(2).all(|w| w[0] <= w[1]));
        let unique: HashSet<u32> = r.indices.iter().copied().collect();
        assert_eq!(unique.len(), r.indices.len());
    }
}

fn scaled_gaussian() -> proxima::benchmark::Dataset {
    let mut dataset = gaussian_dataset(N, N_QUERIES, DIM, 1);
    let radius = neighbor_radius(&dataset.train, N_QUERIES, 4);
    dataset.rescale(radius);
    dataset
}

fn l2_index(train: &[Vec<f32>]) -> L2Index {
    let params = LSHParams::new(10, 1, DIM).seed(1).in_memory(true);
    let mut index = L2Index::l2(params, L2Params { r: 4.0 }).expect("create");
    index.fit(train, 5000).expect("fit");
    index
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn l2_scenario_on_rescaled_gaussian_data() {
    let dataset = scaled_gaussian();
    let index = l2_index(&dataset.train);
    assert_eq!(index.len(), N);

    let options = QueryOptions::default().only_index(true).top_k(5);
    let results = index.predict(&dataset.test, &options).expect("predict");
    assert_eq!(results.len(), N_QUERIES);
    check_structure(&results, 5);
    assert!(results.iter().all(|r| r.vectors.is_none()));

    // Some query must collide with something at this scale.
    let total: usize = results.iter().map(|r| r.n_collisions).sum();
    assert!(total > 0);
}

#[test]
fn cosine_scenario_on_raw_gaussian_data() {
    let dataset = gaussian_dataset(N, N_QUERIES, DIM, 1);
    let params = LSHParams::new(10, 1, DIM).seed(1).in_memory(true);
    let mut index = CosineIndex::cosine(params).expect("create");
    index.fit(&dataset.train, 5000).expect("fit");

    let results = index
        .predict(&dataset.test, &QueryOptions::default())
        .expect("predict");
    check_structure(&results, 5);
    for r in &results {
        let vectors = r.vectors.as_ref().expect("vectors requested");
        assert_eq!(vectors.len(), r.len());
        for (id, v) in r.indices.iter().zip(vectors) {
            assert_eq!(v, &dataset.train[*id as usize]);
        }
    }
}

// =============================================================================
// Self-match and determinism
// =============================================================================

#[test]
fn stored_vectors_find_themselves() {
    let dataset = scaled_gaussian();
    let index = l2_index(&dataset.train);
    for i in [0usize, 17, 4242, N - 1] {
        let r = index
            .predict_one(&dataset.train[i], &QueryOptions::default())
            .expect("predict");
        assert_eq!(r.indices[0], i as u32);
        assert_eq!(r.distances[0], 0.0);
    }
}

#[test]
fn same_seed_gives_identical_results_across_indexes() {
    let dataset = scaled_gaussian();
    let a = l2_index(&dataset.train);
    let b = l2_index(&dataset.train);
    let options = QueryOptions::default().top_k(10);
    assert_eq!(
        a.predict(&dataset.test, &options).expect("predict"),
        b.predict(&dataset.test, &options).expect("predict")
    );
}

#[test]
fn reset_then_fit_reproduces_results() {
    let dataset = scaled_gaussian();
    let mut index = l2_index(&dataset.train);
    let options = QueryOptions::default();
    let before = index.predict(&dataset.test, &options).expect("predict");

    index.reset(3).expect("reset");
    assert!(index.is_empty());
    index.fit(&dataset.train, 1000).expect("refit");
    let after = index.predict(&dataset.test, &options).expect("predict");
    assert_eq!(before, after);
}

// =============================================================================
// Multi-probe and bounded search
// =============================================================================

#[test]
fn multi_probe_candidates_cover_base_candidates() {
    let dataset = scaled_gaussian();
    let mut l2 = l2_index(&dataset.train);
    let base = l2.query_bucket_ids_batch(&dataset.test).expect("base");
    l2.multi_probe(16);
    assert_eq!(l2.probe_mode(), ProbeMode::MultiProbe { budget: 16 });
    let probed = l2.query_bucket_ids_batch(&dataset.test).expect("probed");
    for (b, p) in base.iter().zip(&probed) {
        let p: HashSet<u32> = p.iter().copied().collect();
        assert!(b.iter().all(|id| p.contains(id)));
    }

    let params = LSHParams::new(10, 2, DIM).seed(2).in_memory(true);
    let mut cosine = CosineIndex::cosine(params).expect("create");
    cosine.fit(&dataset.train, 5000).expect("fit");
    let base = cosine.query_bucket_ids_batch(&dataset.test).expect("base");
    cosine.multi_probe(10);
    let probed = cosine.query_bucket_ids_batch(&dataset.test).expect("probed");
    for (b, p) in base.iter().zip(&probed) {
        assert!(p.len() >= b.len());
        let p: HashSet<u32> = p.iter().copied().collect();
        assert!(b.iter().all(|id| p.contains(id)));
    }
}

#[test]
fn multi_probe_does_not_lower_recall() {
    let dataset = scaled_gaussian();
    let gt = compute_all_ground_truth(&dataset, 5, DistanceMetric::L2);
    let mut index = l2_index(&dataset.train);
    let options = QueryOptions::default().only_index(true);

    let ids = |index: &L2Index| -> Vec<Vec<u32>> {
        index
            .predict(&dataset.test, &options)
            .expect("predict")
            .into_iter()
            .map(|r| r.indices)
            .collect()
    };
    let base = mean_recall(&gt, &ids(&index), 5);
    index.multi_probe(32);
    let probed = mean_recall(&gt, &ids(&index), 5);
    assert!(probed >= base, "multi-probe recall {probed} < base {base}");
}

#[test]
fn bounded_search_reports_the_raw_collision_count() {
    let dataset = scaled_gaussian();
    let index = l2_index(&dataset.train);
    let unbounded = index
        .predict(&dataset.test, &QueryOptions::default())
        .expect("predict");
    let bounded = index
        .predict(&dataset.test, &QueryOptions::default().bound(1))
        .expect("predict");
    check_structure(&bounded, 5);
    for (u, b) in unbounded.iter().zip(&bounded) {
        assert_eq!(u.n_collisions, b.n_collisions);
        // Whatever a bounded scan accepts is accepted by a full scan too.
        assert!(b.len() <= u.len());
        if let (Some(&bd), Some(&ud)) = (b.distances.first(), u.distances.first()) {
            assert!(ud <= bd);
        }
    }
}

// =============================================================================
// Incremental storage
// =============================================================================

#[test]
fn appended_vectors_are_queryable() {
    let dataset = scaled_gaussian();
    let mut index = l2_index(&dataset.train[..1000]);
    let ids = index.store_vecs(&dataset.train[1000..1100]).expect("store");
    assert_eq!(ids, (1000..1100).collect::<Vec<u32>>());
    let id = index.store_vec(&dataset.train[1100]).expect("store");
    assert_eq!(id, 1100);

    let r = index
        .predict_one(&dataset.train[1050], &QueryOptions::default())
        .expect("predict");
    assert_eq!(r.indices[0], 1050);
}
