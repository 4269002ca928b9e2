//! Multi-probe sequences.
//!
//! Instead of looking only in the bucket the query hashes to, probe nearby
//! buckets as well. Two strategies:
//!
//! - [`query_directed`] (integer digits): perturbation sets are scored by how
//!   close the query sits to the slot boundaries it would cross, and generated in
//!   increasing score with a min-heap (Algorithm 1 of Lv et al. 2007).
//! - [`step_wise_flips`] (binary digits): all one-bit flips, then all two-bit
//!   flips, and so on.
//!
//! Both return the unperturbed key first, followed by at most `budget` keys.

use super::HashKey;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One slot-boundary crossing: move digit `coord` by `delta`, at cost `score`.
#[derive(Debug, Clone, Copy)]
struct Crossing {
    coord: usize,
    delta: i32,
    score: f32,
}

/// A perturbation set: positions into the score-sorted crossing list.
#[derive(Debug, Clone, PartialEq)]
struct PerturbSet {
    positions: Vec<usize>,
    score: f32,
}

impl Eq for PerturbSet {}

impl Ord for PerturbSet {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we pop the lowest score first.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.positions.cmp(&self.positions))
    }
}

impl PartialOrd for PerturbSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PerturbSet {
    fn last(&self) -> usize {
        self.positions[self.positions.len() - 1]
    }

    /// Replace the largest position by its successor.
    fn shift(&self, crossings: &[Crossing]) -> Option<Self> {
        let max = self.last();
        let next = crossings.get(max + 1)?;
        let mut positions = self.positions.clone();
        *positions.last_mut()? = max + 1;
        Some(Self {
            positions,
            score: self.score - crossings[max].score + next.score,
        })
    }

    /// Add the successor of the largest position.
    fn expand(&self, crossings: &[Crossing]) -> Option<Self> {
        let max = self.last();
        let next = crossings.get(max + 1)?;
        let mut positions = self.positions.clone();
        positions.push(max + 1);
        Some(Self {
            positions,
            score: self.score + next.score,
        })
    }

    /// A set is usable only if it moves each digit at most once.
    fn is_valid(&self, crossings: &[Crossing]) -> bool {
        let mut coords: Vec<usize> = self.positions.iter().map(|&p| crossings[p].coord).collect();
        coords.sort_unstable();
        coords.windows(2).all(|w| w[0] != w[1])
    }

    /// `None` when a digit sits at the edge of the `i32` range and cannot move.
    fn apply(&self, hash: &HashKey, crossings: &[Crossing]) -> Option<HashKey> {
        let mut key = hash.clone();
        for &p in &self.positions {
            let c = crossings[p];
            key[c.coord] = key[c.coord].checked_add(c.delta)?;
        }
        Some(key)
    }
}

/// Query-directed probing for integer digits.
///
/// `lower[j]` is the query's offset inside slot `hash[j]`, in `[0, r)`; the
/// distance to the lower boundary is `lower[j]`, to the upper one `r - lower[j]`.
pub fn query_directed(hash: &HashKey, lower: &[f32], r: f32, budget: usize) -> Vec<HashKey> {
    debug_assert_eq!(hash.len(), lower.len());
    let mut probes = Vec::with_capacity(budget + 1);
    probes.push(hash.clone());
    if budget == 0 || hash.is_empty() {
        return probes;
    }

    let mut crossings: Vec<Crossing> = Vec::with_capacity(2 * lower.len());
    for (coord, &x) in lower.iter().enumerate() {
        crossings.push(Crossing {
            coord,
            delta: -1,
            score: x * x,
        });
        let up = r - x;
        crossings.push(Crossing {
            coord,
            delta: 1,
            score: up * up,
        });
    }
    crossings.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.coord.cmp(&b.coord))
            .then_with(|| a.delta.cmp(&b.delta))
    });

    let mut heap = BinaryHeap::new();
    heap.push(PerturbSet {
        positions: vec![0],
        score: crossings[0].score,
    });

    while probes.len() <= budget {
        let Some(set) = heap.pop() else {
            break;
        };
        if let Some(shifted) = set.shift(&crossings) {
            heap.push(shifted);
        }
        if let Some(expanded) = set.expand(&crossings) {
            heap.push(expanded);
        }
        if set.is_valid(&crossings) {
            if let Some(key) = set.apply(hash, &crossings) {
                probes.push(key);
            }
        }
    }
    probes
}

/// Step-wise probing for binary digits.
pub fn step_wise_flips(hash: &HashKey, budget: usize) -> Vec<HashKey> {
    let mut probes = Vec::with_capacity(budget + 1);
    probes.push(hash.clone());
    let n = hash.len();

    let mut k = 1;
    while probes.len() <= budget && k <= n {
        let mut comb: Vec<usize> = (0..k).collect();
        loop {
            let mut key = hash.clone();
            for &i in &comb {
                key[i] = 1 - key[i];
            }
            probes.push(key);
            if probes.len() > budget || !next_combination(&mut comb, n) {
                break;
            }
        }
        k += 1;
    }
    probes
}

/// Advance `comb` (strictly increasing indices below `n`) to the next
/// combination in lexicographic order. Returns `false` when exhausted.
fn next_combination(comb: &mut [usize], n: usize) -> bool {
    let k = comb.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if comb[i] < n - k + i {
            comb[i] += 1;
            for j in i + 1..k {
                comb[j] = comb[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
