//! Multi-query weighted search
//!
//! 1. Each query runs its own top-K over every shard.
//! 2. The returned ordinals are unioned into one candidate set.
//! 3. Every candidate's stored vector is fetched once from the catalog.
//! 4. Each candidate scores Σ weight × similarity(candidate, query).
//! 5. Candidates sort by score (descending, ties by ordinal) and the top K
//!    are kept.
//!
//! Scores are exact over the candidate set; the candidate set is only as
//! complete as the union of the per-query top-K lists. The sort is always
//! "higher wins", so distance metrics need negative weights to rank
//! nearer documents first.

use std::collections::BTreeSet;

use anyhow::{anyhow, bail, Context, Result};

use flatshard_core::{l2_normalize, DocumentStore, ShardCatalog, Similarity};
use flatshard_encoder::cache::CacheStats;
use flatshard_encoder::{CachedEncoder, Encoder};

/// A query vector with its fusion weight
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedQuery {
    pub vector: Vec<f32>,
    pub weight: f32,
}

/// A query text with its fusion weight, as read from the host
#[derive(Debug, Clone, PartialEq)]
pub struct QueryText {
    pub text: String,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub queries: Vec<QueryText>,
    pub k: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredOrdinal {
    pub ordinal: usize,
    pub score: f32,
}

/// A ranked result hydrated with its document
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub ordinal: usize,
    pub text: String,
}

/// Search session over one loaded index
pub struct SearchEngine<E: Encoder> {
    catalog: ShardCatalog,
    documents: DocumentStore,
    encoder: CachedEncoder<E>,
    warned_distance_weight: bool,
}

impl<E: Encoder> SearchEngine<E> {
    pub fn new(catalog: ShardCatalog, documents: DocumentStore, encoder: CachedEncoder<E>) -> Result<Self> {
        if encoder.dim() != catalog.dim() {
            bail!(
                "Encoder {} produces {} dimensions, index has {}",
                encoder.model_id(),
                encoder.dim(),
                catalog.dim()
            );
        }
        tracing::info!(
            "Search engine ready: {} vectors, {}, encoder {}, query cache of {}",
            catalog.len(),
            catalog.similarity(),
            encoder.model_id(),
            encoder.capacity()
        );
        if documents.len() < catalog.len() {
            tracing::warn!(
                "Document store holds {} records but the index holds {} vectors",
                documents.len(),
                catalog.len()
            );
        }

        Ok(Self {
            catalog,
            documents,
            encoder,
            warned_distance_weight: false,
        })
    }

    pub fn catalog(&self) -> &ShardCatalog {
        &self.catalog
    }

    pub fn similarity(&self) -> Similarity {
        self.catalog.similarity()
    }

    /// Query cache counters since the engine was created
    pub fn cache_stats(&self) -> CacheStats {
        self.encoder.stats()
    }

    /// Swap the query model, returning the previous one
    ///
    /// The replacement must produce vectors of the index width. Cached
    /// query vectors belong to the old model and are dropped.
    pub fn replace_encoder(&mut self, encoder: E) -> Result<E> {
        if encoder.dim() != self.encoder.inner().dim() {
            bail!(
                "Encoder {} produces {} dimensions, index has {}",
                encoder.model_id(),
                encoder.dim(),
                self.catalog.dim()
            );
        }
        Ok(self.encoder.replace_model(encoder))
    }

    /// Rank the candidates retrieved by `queries`, keeping the best `k`
    pub fn search_vectors(&self, queries: &[WeightedQuery], k: usize) -> Result<Vec<ScoredOrdinal>> {
        if k == 0 || queries.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = BTreeSet::new();
        for (i, query) in queries.iter().enumerate() {
            let hits = self
                .catalog
                .search(&query.vector, k)
                .with_context(|| format!("searching query {}", i))?;
            candidates.extend(hits.into_iter().map(|hit| hit.id));
        }

        let similarity = self.similarity();
        let mut ranked = candidates
            .into_iter()
            .map(|ordinal| {
                let vector = self
                    .catalog
                    .reconstruct(ordinal)
                    .ok_or_else(|| anyhow!("Ordinal {} returned by search has no stored vector", ordinal))?;
                let score = queries
                    .iter()
                    .map(|q| q.weight * similarity.score(vector, &q.vector))
                    .sum::<f32>();
                Ok(ScoredOrdinal { ordinal, score })
            })
            .collect::<Result<Vec<_>>>()?;

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Encode the query texts, rank, and attach each hit's document
    pub fn search(&mut self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let similarity = self.similarity();
        let mut queries = Vec::with_capacity(request.queries.len());
        for query in &request.queries {
            let mut vector = self
                .encoder
                .encode(&query.text)
                .with_context(|| format!("encoding query \"{}\"", query.text))?;
            if similarity.normalizes_on_insert() {
                l2_normalize(&mut vector);
            }
            if similarity.is_distance() && query.weight >= 0.0 && !self.warned_distance_weight {
                tracing::warn!(
                    "Non-negative weight {} with distance metric {}: larger distances will rank higher",
                    query.weight,
                    similarity
                );
                self.warned_distance_weight = true;
            }
            queries.push(WeightedQuery {
                vector,
                weight: query.weight,
            });
        }

        let ranked = self.search_vectors(&queries, request.k)?;

        let hits = ranked
            .into_iter()
            .map(|scored| {
                let doc = self
                    .documents
                    .resolve(scored.ordinal)
                    .with_context(|| format!("resolving document {}", scored.ordinal))?;
                Ok(SearchHit {
                    id: doc.id.to_string(),
                    score: scored.score,
                    ordinal: scored.ordinal,
                    text: doc.text.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Served request: {} queries, k={}, {} results",
            request.queries.len(),
            request.k,
            hits.len()
        );
        Ok(hits)
    }
}
