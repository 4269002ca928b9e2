//! Basic LSH search.
//!
//! Index 10,000 Gaussian points, rescaled so that neighbors sit near distance
//! 1, and compare recall and candidate counts across probe settings.
//!
//! ```bash
//! RUST_LOG=info cargo run --example basic_search
//! ```

use proxima::benchmark::{
    compute_all_ground_truth, gaussian_dataset, mean_collisions, mean_recall, neighbor_radius,
};
use proxima::stats::{detection_probability, estimate_hash_tables, l2_collision_probability};
use proxima::{DistanceMetric, L2Index, L2Params, LSHParams, QueryOptions, DEFAULT_CHUNK_SIZE};
use tracing_subscriber::EnvFilter;

fn main() -> proxima::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("LSH basic search");
    println!("================\n");

    let k = 10;
    let r = 4.0;
    let p1 = l2_collision_probability(f64::from(r), 1.0);
    let l = estimate_hash_tables(0.1, p1, k)?;
    println!("P1 at r={r}: {p1:.3}");
    println!("tables for 90% detection with K={k}: {l}");
    println!(
        "detection probability with L=1: {:.3}, L={l}: {:.3}\n",
        detection_probability(p1, k, 1),
        detection_probability(p1, k, l)
    );

    let mut dataset = gaussian_dataset(10_000, 100, 10, 1);
    let radius = neighbor_radius(&dataset.train, 100, 4);
    dataset.rescale(radius);
    let gt = compute_all_ground_truth(&dataset, 5, DistanceMetric::L2);

    let params = LSHParams::new(k, 1, 10).seed(1).in_memory(true).log(true);
    let mut index = L2Index::l2(params, L2Params { r })?;
    index.fit(&dataset.train, DEFAULT_CHUNK_SIZE)?;
    println!("{}", index.describe()?);

    let options = QueryOptions::default().only_index(true);
    for budget in [None, Some(4), Some(16), Some(64)] {
        match budget {
            None => index.base(),
            Some(b) => index.multi_probe(b),
        }
        let results = index.predict(&dataset.test, &options)?;
        let ids: Vec<Vec<u32>> = results.iter().map(|r| r.indices.clone()).collect();
        println!(
            "{:<16} recall@5 {:.3}  mean collisions {:.1}",
            format!("{:?}", index.probe_mode()),
            mean_recall(&gt, &ids, 5),
            mean_collisions(results.iter().map(|r| r.n_collisions))
        );
    }
    Ok(())
}
