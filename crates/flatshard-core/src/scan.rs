//! Exact top-k selection for linear scans
//!
//! `TopK` keeps the k best hits seen so far in a bounded heap whose root is
//! the current worst hit. Shards feed it local hits during a scan; the
//! catalog feeds it global hits to merge shards.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::metric::{ScanOrder, Similarity};

/// A scan result: an id (local or global ordinal) and its raw scan value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub id: usize,
    pub value: f32,
}

/// Heap entry ordered so that the *worse* hit compares greater
#[derive(Clone, Copy)]
struct Ranked {
    hit: Hit,
    order: ScanOrder,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_value = match self.order {
            ScanOrder::HigherIsBetter => other.hit.value.total_cmp(&self.hit.value),
            ScanOrder::LowerIsBetter => self.hit.value.total_cmp(&other.hit.value),
        };
        // Equal values: the lower id wins, keeping results deterministic
        by_value.then(self.hit.id.cmp(&other.hit.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct TopK {
    k: usize,
    order: ScanOrder,
    heap: BinaryHeap<Ranked>,
}

impl TopK {
    pub fn new(k: usize, order: ScanOrder) -> Self {
        Self {
            k,
            order,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1 << 16)),
        }
    }

    pub fn push(&mut self, hit: Hit) {
        if self.k == 0 {
            return;
        }
        let entry = Ranked {
            hit,
            order: self.order,
        };
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if let Some(worst) = self.heap.peek() {
            if entry < *worst {
                self.heap.pop();
                self.heap.push(entry);
            }
        }
    }

    /// Hits ordered best first
    pub fn into_sorted(self) -> Vec<Hit> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.hit)
            .collect()
    }
}

/// Linear scan of `vectors` against `query`, returning at most `k` hits
///
/// Ids are `id_base + position`, so a shard can report global ordinals
/// directly. Fewer than `k` hits come back when there are fewer vectors.
pub fn scan<'a, I>(vectors: I, query: &[f32], similarity: Similarity, k: usize, id_base: usize) -> Vec<Hit>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut top = TopK::new(k, similarity.scan_order());
    for (i, stored) in vectors.into_iter().enumerate() {
        top.push(Hit {
            id: id_base + i,
            value: similarity.scan_value(stored, query),
        });
    }
    top.into_sorted()
}
