//! Property-based tests for proxima.
//!
//! These tests verify invariants that should hold regardless of input:
//! - Results are sorted, bounded by top_k and below the acceptance threshold
//! - Multi-probe sequences start with the query key and never repeat a key
//! - Recall is always in [0, 1]
//! - Collision probabilities are probabilities

use proptest::prelude::*;
use proxima::hash::probe::{query_directed, step_wise_flips};
use proxima::hash::HashKey;
use proxima::{CosineIndex, L2Index, L2Params, LSHParams, QueryOptions, ACCEPT_DISTANCE};
use std::collections::HashSet;

prop_compose! {
    fn arb_vector(dim: usize)(vec in prop::collection::vec(-2.0f32..2.0, dim)) -> Vec<f32> {
        vec
    }
}

prop_compose! {
    fn arb_dataset(dim: usize, max: usize)(
        vecs in prop::collection::vec(arb_vector(dim), 1..max)
    ) -> Vec<Vec<f32>> {
        vecs
    }
}

mod retrieval_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn l2_results_are_well_formed(
            data in arb_dataset(4, 60),
            queries in prop::collection::vec(arb_vector(4), 1..8),
            top_k in 0usize..6,
            seed in 1u64..1000,
        ) {
            let params = LSHParams::new(4, 2, 4).seed(seed).in_memory(true);
            let mut index = L2Index::l2(params, L2Params { r: 1.0 }).unwrap();
            index.fit(&data, 16).unwrap();
            let results = index.predict(&queries, &QueryOptions::default().top_k(top_k)).unwrap();
            prop_assert_eq!(results.len(), queries.len());
            for r in &results {
                prop_assert!(r.len() <= top_k);
                prop_assert!(r.n_collisions >= r.len());
                prop_assert!(r.distances.iter().all(|&d| d < ACCEPT_DISTANCE));
                prop_assert!(r.distances.windows(2).all(|w| w[0] <= w[1]));
                prop_assert!(r.indices.iter().all(|&i| (i as usize) < data.len()));
            }
        }

        #[test]
        fn stored_vectors_match_themselves(
            data in arb_dataset(3, 40),
            seed in 1u64..1000,
        ) {
            let params = LSHParams::new(5, 1, 3).seed(seed).in_memory(true);
            let mut index = L2Index::l2(params, L2Params::default()).unwrap();
            index.fit(&data, 8).unwrap();
            for v in &data {
                let r = index.predict_one(v, &QueryOptions::default()).unwrap();
                prop_assert!(!r.is_empty());
                prop_assert_eq!(r.distances[0], 0.0);
                prop_assert_eq!(&data[r.indices[0] as usize], v);
            }
        }

        #[test]
        fn cosine_multi_probe_is_a_superset(
            data in arb_dataset(5, 50),
            query in arb_vector(5),
            budget in 0usize..20,
        ) {
            let params = LSHParams::new(6, 2, 5).seed(3).in_memory(true);
            let mut index = CosineIndex::cosine(params).unwrap();
            index.fit(&data, 50).unwrap();
            let base: HashSet<u32> = index.query_bucket_ids(&query).unwrap().into_iter().collect();
            index.multi_probe(budget);
            let probed: HashSet<u32> = index.query_bucket_ids(&query).unwrap().into_iter().collect();
            prop_assert!(base.is_subset(&probed));
        }
    }
}

mod probe_props {
    use super::*;

    fn key(digits: &[i32]) -> HashKey {
        digits.iter().copied().collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn query_directed_keys_are_distinct_neighbors(
            digits in prop::collection::vec(-5i32..5, 1..8),
            offsets in prop::collection::vec(0.0f32..1.0, 8),
            budget in 0usize..40,
        ) {
            let hash = key(&digits);
            let lower = &offsets[..digits.len()];
            let probes = query_directed(&hash, lower, 1.0, budget);
            prop_assert_eq!(&probes[0], &hash);
            prop_assert!(probes.len() <= budget + 1);
            let unique: HashSet<HashKey> = probes.iter().cloned().collect();
            prop_assert_eq!(unique.len(), probes.len());
            for p in &probes {
                prop_assert!(p.iter().zip(&hash).all(|(a, b)| (a - b).abs() <= 1));
            }
            // 3^n - 1 perturbations exist in total.
            let available = 3usize.pow(digits.len() as u32) - 1;
            prop_assert_eq!(probes.len(), budget.min(available) + 1);
        }

        #[test]
        fn step_wise_keys_are_distinct_bit_strings(
            bits in prop::collection::vec(0i32..2, 1..7),
            budget in 0usize..80,
        ) {
            let hash = key(&bits);
            let probes = step_wise_flips(&hash, budget);
            prop_assert_eq!(&probes[0], &hash);
            let unique: HashSet<HashKey> = probes.iter().cloned().collect();
            prop_assert_eq!(unique.len(), probes.len());
            prop_assert!(probes.iter().all(|p| p.iter().all(|&b| b == 0 || b == 1)));
            let available = (1usize << bits.len()) - 1;
            prop_assert_eq!(probes.len(), budget.min(available) + 1);
            // Flip counts never decrease along the sequence.
            let flips: Vec<usize> = probes
                .iter()
                .map(|p| p.iter().zip(&hash).filter(|(a, b)| a != b).count())
                .collect();
            prop_assert!(flips.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}

mod metric_props {
    use super::*;
    use proxima::benchmark::recall_at_k;
    use proxima::stats::{
        cosine_collision_probability, detection_probability, l2_collision_probability,
    };

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn recall_in_unit_interval(
            gt in prop::collection::vec(0u32..100, 0..20),
            retrieved in prop::collection::vec(0u32..100, 0..20),
            k in 1usize..20,
        ) {
            let r = recall_at_k(&gt, &retrieved, k);
            prop_assert!((0.0..=1.0).contains(&r), "recall {}", r);
        }

        #[test]
        fn collision_probabilities_are_probabilities(
            r in 0.1f64..20.0,
            c in 0.1f64..10.0,
            sim in -1.0f64..1.0,
        ) {
            let p = l2_collision_probability(r, c);
            prop_assert!((0.0..=1.0).contains(&p), "l2 {}", p);
            let q = cosine_collision_probability(sim);
            prop_assert!((0.0..=1.0).contains(&q), "cosine {}", q);
        }

        #[test]
        fn more_tables_detect_more(
            p1 in 0.01f64..0.99,
            k in 1usize..16,
            l in 1usize..32,
        ) {
            prop_assert!(detection_probability(p1, k, l + 1) >= detection_probability(p1, k, l));
        }
    }
}
