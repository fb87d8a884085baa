//! Shard storage
//!
//! - [`ShardBuffer`]: the open, append-only shard the builder fills in memory
//!   and persists once it reaches capacity.
//! - [`ShardStore`]: a persisted shard, memory-mapped for zero-copy reads and
//!   exact linear-scan search.
//!
//! # Safety
//!
//! `ShardStore` converts the mapped bytes with `bytemuck::try_cast_slice`,
//! which checks f32 alignment instead of assuming it. Shard files must not
//! be truncated or rewritten while mapped.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use thiserror::Error;

use crate::format::{FormatError, ShardHeader, ShardWriter, HEADER_SIZE};
use crate::metric::Similarity;
use crate::scan::{scan, Hit};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index out of bounds: {index} >= {count}")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Shard declares zero dimensions")]
    ZeroDimensions,

    #[error("Shard truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Alignment error: byte slice not aligned to f32 (4 bytes)")]
    AlignmentError,
}

/// In-memory shard being filled by the index builder
pub struct ShardBuffer {
    dim: usize,
    similarity: Similarity,
    data: Vec<f32>,
}

impl ShardBuffer {
    pub fn new(dim: usize, similarity: Similarity) -> Self {
        Self {
            dim,
            similarity,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn similarity(&self) -> Similarity {
        self.similarity
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append one vector in ordinal order
    pub fn push(&mut self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Write the shard to `path`, returning the number of vectors written
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<u32, StoreError> {
        if self.dim == 0 {
            return Err(StoreError::ZeroDimensions);
        }
        let mut writer = ShardWriter::create(path, self.dim, self.similarity)?;
        for vector in self.data.chunks_exact(self.dim) {
            writer.write_vector(vector)?;
        }
        Ok(writer.finish()?)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Memory-mapped, read-only shard
pub struct ShardStore {
    mmap: Mmap,
    /// Number of vectors in the shard
    pub count: usize,
    /// Dimensionality of each vector
    pub dim: usize,
    similarity: Similarity,
}

impl ShardStore {
    /// Map a shard file and validate its header against the file length
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let header = ShardHeader::from_bytes(&mmap)?;
        if header.dimensions == 0 {
            return Err(StoreError::ZeroDimensions);
        }

        let expected = (header.count as usize)
            .checked_mul(header.dimensions as usize)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .unwrap_or(usize::MAX);
        if mmap.len() < expected {
            return Err(StoreError::Truncated {
                expected,
                actual: mmap.len(),
            });
        }

        Ok(Self {
            mmap,
            count: header.count as usize,
            dim: header.dimensions as usize,
            similarity: header.similarity,
        })
    }

    /// Similarity recorded when the shard was built
    pub fn similarity(&self) -> Similarity {
        self.similarity
    }

    /// The whole vector slab as one flat slice
    pub fn vectors(&self) -> Result<&[f32], StoreError> {
        let end = HEADER_SIZE + self.count * self.dim * std::mem::size_of::<f32>();
        bytemuck::try_cast_slice(&self.mmap[HEADER_SIZE..end]).map_err(|_| StoreError::AlignmentError)
    }

    /// Exact stored vector at a local offset
    pub fn try_get(&self, index: usize) -> Result<&[f32], StoreError> {
        if index >= self.count {
            return Err(StoreError::IndexOutOfBounds {
                index,
                count: self.count,
            });
        }

        let start = HEADER_SIZE + index * self.dim * std::mem::size_of::<f32>();
        let end = start + self.dim * std::mem::size_of::<f32>();
        bytemuck::try_cast_slice(&self.mmap[start..end]).map_err(|_| StoreError::AlignmentError)
    }

    /// Exhaustive top-k scan; hit ids are `id_base + local offset`
    pub fn search(&self, query: &[f32], k: usize, id_base: usize) -> Result<Vec<Hit>, StoreError> {
        if query.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        let slab = self.vectors()?;
        Ok(scan(slab.chunks_exact(self.dim), query, self.similarity, k, id_base))
    }

    pub fn memory_bytes(&self) -> usize {
        self.mmap.len()
    }
}
