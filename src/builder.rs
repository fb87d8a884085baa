//! Index builder: text batches in, numbered shard files out
//!
//! ```text
//! push(text) ─▶ pending batch ──(B texts or flush)──▶ encoder ─▶ open shard
//!                                                                   │
//!                                           len ≥ chunks_size ──▶ persist
//!                                                                 index_<n>
//! ```
//!
//! The chunk-size check runs only after a whole batch has been appended,
//! so a batch never straddles two shards and a shard can hold up to
//! `batch_size - 1` vectors more than `chunks_size`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use flatshard_core::{l2_normalize, ShardBuffer};
use flatshard_encoder::Encoder;

use crate::config::IndexConfig;

/// A shard written to disk by the builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SealedShard {
    pub sequence: u32,
    pub path: PathBuf,
    pub count: usize,
}

/// Outcome of processing one batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Time spent in the encoder
    pub extraction: Duration,
    /// Time spent appending vectors and persisting a sealed shard
    pub indexing: Duration,
    pub documents: usize,
    pub sealed: Option<SealedShard>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSummary {
    pub shard_sizes: Vec<usize>,
    pub total_vectors: usize,
    pub paths: Vec<PathBuf>,
}

impl BuildSummary {
    fn record(&mut self, shard: &SealedShard) {
        self.shard_sizes.push(shard.count);
        self.total_vectors += shard.count;
        self.paths.push(shard.path.clone());
    }
}

pub struct IndexBuilder<E: Encoder> {
    config: IndexConfig,
    encoder: E,
    shard: ShardBuffer,
    pending: Vec<String>,
    next_sequence: u32,
    summary: BuildSummary,
}

impl<E: Encoder> IndexBuilder<E> {
    pub fn new(config: IndexConfig, encoder: E) -> Result<Self> {
        config.validate()?;
        if encoder.dim() != config.dim {
            bail!(
                "Encoder {} produces {} dimensions, index is configured for {}",
                encoder.model_id(),
                encoder.dim(),
                config.dim
            );
        }

        let shard = ShardBuffer::new(config.dim, config.similarity);
        let pending = Vec::with_capacity(config.batch_size);
        Ok(Self {
            config,
            encoder,
            shard,
            pending,
            next_sequence: 1,
            summary: BuildSummary::default(),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Vectors in the open (unsealed) shard
    pub fn open_shard_len(&self) -> usize {
        self.shard.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Accept one input line
    ///
    /// An empty line forces the pending batch through, even a short or
    /// empty one. Returns a report whenever a batch was processed.
    pub fn push(&mut self, text: &str) -> Result<Option<BatchReport>> {
        let flush = text.is_empty();
        if !flush {
            self.pending.push(text.to_string());
        }

        if flush || self.pending.len() >= self.config.batch_size {
            return self.flush_batch().map(Some);
        }
        Ok(None)
    }

    /// Encode and append the pending batch, then seal the shard if it is full
    pub fn flush_batch(&mut self) -> Result<BatchReport> {
        let mut report = self.process_pending()?;

        if self.shard.len() >= self.config.chunks_size {
            let started = Instant::now();
            report.sealed = Some(self.seal()?);
            report.indexing += started.elapsed();
        }
        Ok(report)
    }

    /// Process the remainder and write the open shard if it holds anything
    pub fn finish(mut self) -> Result<(BatchReport, BuildSummary)> {
        let mut report = self.process_pending()?;

        if !self.shard.is_empty() {
            let started = Instant::now();
            report.sealed = Some(self.seal()?);
            report.indexing += started.elapsed();
        }

        tracing::info!(
            "Build finished: {} vectors in {} shard(s)",
            self.summary.total_vectors,
            self.summary.shard_sizes.len()
        );
        Ok((report, self.summary))
    }

    fn process_pending(&mut self) -> Result<BatchReport> {
        if self.pending.is_empty() {
            return Ok(BatchReport::default());
        }
        let batch = std::mem::take(&mut self.pending);

        let started = Instant::now();
        let mut vectors = self
            .encoder
            .encode_batch(&batch)
            .with_context(|| format!("encoding a batch of {} documents", batch.len()))?;
        let extraction = started.elapsed();

        if vectors.len() != batch.len() {
            bail!(
                "Encoder returned {} vectors for {} documents",
                vectors.len(),
                batch.len()
            );
        }

        let started = Instant::now();
        let normalize = self.config.similarity.normalizes_on_insert();
        for vector in vectors.iter_mut() {
            if normalize {
                l2_normalize(vector);
            }
            self.shard.push(vector)?;
        }
        let indexing = started.elapsed();

        tracing::debug!(
            "Indexed batch of {} (open shard {} holds {})",
            batch.len(),
            self.next_sequence,
            self.shard.len()
        );

        self.pending = batch;
        self.pending.clear();

        Ok(BatchReport {
            extraction,
            indexing,
            documents: vectors.len(),
            sealed: None,
        })
    }

    fn seal(&mut self) -> Result<SealedShard> {
        let sequence = self.next_sequence;
        let path = self.config.template.path_for(sequence);
        let count = self
            .shard
            .persist(&path)
            .with_context(|| format!("writing shard {} to {:?}", sequence, path))?
            as usize;

        tracing::info!("Sealed shard {} ({} vectors) at {:?}", sequence, count, path);

        self.shard.clear();
        self.next_sequence += 1;

        let sealed = SealedShard {
            sequence,
            path,
            count,
        };
        self.summary.record(&sealed);
        Ok(sealed)
    }
}
