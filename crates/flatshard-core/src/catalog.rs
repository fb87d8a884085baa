//! Shard catalog
//!
//! Loads the contiguous run of shard files `1..=N` named by a
//! [`ShardTemplate`] and maps global ordinals to `(shard, local offset)`.
//!
//! ```text
//! shard     1           2           3
//! size      3           3           1
//! start     0           3           6
//! ordinal   0 1 2 │ 3 4 5 │ 6
//! ```
//!
//! `locate(o)` picks the greatest start ≤ `o` by binary search over the
//! prefix-sum table, so lookups are O(log N) in the number of shards.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::metric::Similarity;
use crate::scan::{Hit, TopK};
use crate::store::{ShardStore, StoreError};
use crate::template::ShardTemplate;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to load shard {sequence} from {path:?}: {source}")]
    Shard {
        sequence: u32,
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("Shard {sequence} has {actual} dimensions, index is configured for {expected}")]
    DimensionMismatch {
        sequence: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Query has {actual} dimensions, index has {expected}")]
    QueryDimension { expected: usize, actual: usize },

    #[error("Search failed in shard {sequence}: {source}")]
    Search {
        sequence: u32,
        #[source]
        source: StoreError,
    },
}

/// Position of a global ordinal inside the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLocation {
    /// 0-based position in the catalog
    pub shard: usize,
    /// Offset inside that shard
    pub offset: usize,
}

impl ShardLocation {
    /// 1-based shard number, as used in filenames
    pub fn sequence(&self) -> u32 {
        self.shard as u32 + 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShardStat {
    pub sequence: u32,
    pub start: usize,
    pub count: usize,
    pub similarity: Similarity,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub dim: usize,
    pub similarity: Similarity,
    pub total_vectors: usize,
    pub shards: Vec<ShardStat>,
}

pub struct ShardCatalog {
    shards: Vec<ShardStore>,
    starts: Vec<usize>,
    total: usize,
    dim: usize,
    similarity: Similarity,
}

impl ShardCatalog {
    /// Load shards 1, 2, 3, ... until the first number with no file
    ///
    /// A missing file ends the sequence. A file that exists but fails to
    /// parse, or whose width differs from `dim`, is an error.
    pub fn load(template: &ShardTemplate, dim: usize, similarity: Similarity) -> Result<Self, CatalogError> {
        let mut catalog = Self::empty(dim, similarity);

        let mut sequence = 1u32;
        while template.exists(sequence) {
            let path = template.path_for(sequence);
            let store = ShardStore::open(&path).map_err(|source| CatalogError::Shard {
                sequence,
                path: path.clone(),
                source,
            })?;
            catalog.push(store)?;
            sequence += 1;
        }

        tracing::info!(
            "Loaded {} shard(s) from {}: {} vectors of dimension {}",
            catalog.shard_count(),
            template,
            catalog.total,
            dim
        );
        Ok(catalog)
    }

    pub fn empty(dim: usize, similarity: Similarity) -> Self {
        Self {
            shards: Vec::new(),
            starts: Vec::new(),
            total: 0,
            dim,
            similarity,
        }
    }

    /// Append the next shard in sequence
    pub fn push(&mut self, store: ShardStore) -> Result<(), CatalogError> {
        let sequence = self.shards.len() as u32 + 1;
        if store.dim != self.dim {
            return Err(CatalogError::DimensionMismatch {
                sequence,
                expected: self.dim,
                actual: store.dim,
            });
        }
        if store.similarity() != self.similarity {
            tracing::warn!(
                "Shard {} was built with similarity {} but the index is configured for {}; scores may be meaningless",
                sequence,
                store.similarity(),
                self.similarity
            );
        }

        self.starts.push(self.total);
        self.total += store.count;
        self.shards.push(store);
        Ok(())
    }

    /// Total number of vectors across all shards
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn similarity(&self) -> Similarity {
        self.similarity
    }

    /// Starting global ordinal of each shard, ascending
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(|s| s.count).collect()
    }

    pub fn locate(&self, ordinal: usize) -> Option<ShardLocation> {
        if ordinal >= self.total {
            return None;
        }
        // First start strictly greater than the ordinal, minus one
        let shard = self.starts.partition_point(|&start| start <= ordinal).checked_sub(1)?;
        Some(ShardLocation {
            shard,
            offset: ordinal - self.starts[shard],
        })
    }

    /// Global ordinal of a location, the inverse of [`locate`](Self::locate)
    pub fn ordinal(&self, location: ShardLocation) -> Option<usize> {
        let start = *self.starts.get(location.shard)?;
        (location.offset < self.shards[location.shard].count).then_some(start + location.offset)
    }

    /// Exact stored vector for a global ordinal
    pub fn reconstruct(&self, ordinal: usize) -> Option<&[f32]> {
        let location = self.locate(ordinal)?;
        self.shards[location.shard].try_get(location.offset).ok()
    }

    /// Top-k over every shard, merged into one list of global ordinals
    ///
    /// Each shard returns at most `k` hits (fewer if it is smaller), and
    /// the merge keeps the `k` best overall in the index's scan order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>, CatalogError> {
        if query.len() != self.dim {
            return Err(CatalogError::QueryDimension {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let mut merged = TopK::new(k, self.similarity.scan_order());
        for (i, (shard, &start)) in self.shards.iter().zip(&self.starts).enumerate() {
            let hits = shard.search(query, k, start).map_err(|source| CatalogError::Search {
                sequence: i as u32 + 1,
                source,
            })?;
            for hit in hits {
                merged.push(hit);
            }
        }
        Ok(merged.into_sorted())
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            dim: self.dim,
            similarity: self.similarity,
            total_vectors: self.total,
            shards: self
                .shards
                .iter()
                .zip(&self.starts)
                .enumerate()
                .map(|(i, (shard, &start))| ShardStat {
                    sequence: i as u32 + 1,
                    start,
                    count: shard.count,
                    similarity: shard.similarity(),
                    bytes: shard.memory_bytes(),
                })
                .collect(),
        }
    }
}
